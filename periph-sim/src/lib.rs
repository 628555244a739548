pub mod arch;
pub mod peripheral;
pub mod sim;
pub mod stimulus;
