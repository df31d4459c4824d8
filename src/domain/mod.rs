//! Domain layer: loan value types, the decimal bridge, and the ports the
//! billing engine depends on.

pub mod loan;
pub mod numeric;
pub mod ports;
