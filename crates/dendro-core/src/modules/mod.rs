pub mod alignment;
pub mod biomass;
pub mod climate;
pub mod detrend;
pub mod ecology;
pub mod master;
pub mod modeling;
pub mod quality;
pub mod serialization;
