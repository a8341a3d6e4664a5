//! Upstream API clients and wire formats.

pub mod identity {
    pub use crate::services::*;
}

pub mod scoring {
    pub use crate::scoring_client::*;
    pub use crate::scoring_models::*;
}

pub mod webhook_models {
    pub use crate::webhook_models::*;
}
