//! EVM chain layer: JSON-RPC transport, call/transaction encoding and the
//! report transaction submitter.

pub mod abi;
pub mod encode;
pub mod rpc;
pub mod submitter;

pub use rpc::{EvmRpcClient, EvmRpcClientBuilder};
pub use submitter::TransactionSubmitter;
