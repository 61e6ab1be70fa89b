pub mod demo;
pub mod params;
pub mod util;
