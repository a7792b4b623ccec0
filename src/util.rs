// Re-export from common crate to keep crate::util::* paths stable
pub use xpbridge_common::config;
pub use xpbridge_common::paths;
pub use xpbridge_common::threading;
pub mod logging;
