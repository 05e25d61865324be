pub mod attack;
pub mod health;
pub mod policies;
pub mod scanners;
pub mod scans;
