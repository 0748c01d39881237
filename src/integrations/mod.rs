//! External service integrations.

pub mod regulator_client {
    pub use crate::regulator_client::*;
}

pub mod registry_client {
    pub use crate::registry_client::*;
}

pub mod business_data_client {
    pub use crate::business_data_client::*;
}

pub mod screening_client {
    pub use crate::screening_client::*;
}

pub mod source_adapter {
    pub use crate::source_adapter::*;
}
