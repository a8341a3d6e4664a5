// Pipeline stages and shared errors/models
pub mod signature {
    pub use crate::signature::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod enrichment {
    pub use crate::enrichment::*;
}

pub mod mapper {
    pub use crate::mapper::*;
}

pub mod webhook_service {
    pub use crate::webhook_service::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod errors {
    pub use crate::errors::*;
}
