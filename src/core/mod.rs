// Domain-layer modules: fan-out, normalization, screening rules
pub mod aggregator {
    pub use crate::aggregator::*;
}

pub mod normalizer {
    pub use crate::normalizer::*;
}

pub mod screening {
    pub use crate::screening::*;
}

pub mod selection {
    pub use crate::selection::*;
}

pub mod models {
    pub use crate::models::*;
}
