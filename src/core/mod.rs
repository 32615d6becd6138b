// Core BSQ data structures

mod types;
mod hash;
mod raw;
mod tx;
mod candidate;
mod block;
pub mod op_return;
pub mod serialize;

pub use types::*;
pub use hash::*;
pub use raw::*;
pub use tx::*;
pub use candidate::*;
pub use block::*;
pub use op_return::{OpReturnData, OpReturnType, parse_op_return};
pub use serialize::Serializable;
