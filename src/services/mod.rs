pub mod assessment;
