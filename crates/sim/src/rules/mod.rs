pub mod situation;
pub mod heading_hold;
pub mod give_way;

pub use give_way::GiveWayPolicy;
pub use heading_hold::HeadingHoldPolicy;
