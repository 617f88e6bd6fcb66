pub mod balance;
pub mod rpc;
pub mod wallet;

pub use balance::SolanaBalanceOracle;
pub use rpc::SolanaClient;
pub use wallet::DelegatedWallet;
