pub(crate) mod extract;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;
