pub mod hash;
pub mod shell;

#[cfg(test)]
pub mod testutil;
