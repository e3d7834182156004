pub mod claude;
pub mod guard;
pub mod parse;
pub mod traits;

pub use claude::Claude;
pub use traits::RemoteClassifier;
