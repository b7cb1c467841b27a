pub mod assemble;
pub mod dedup;
pub mod extract;
pub mod score;
pub mod segment;
