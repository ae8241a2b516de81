pub mod brain;
pub mod service;
pub mod util;

#[cfg(test)]
mod testing;
