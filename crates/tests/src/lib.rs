pub mod fixtures;

#[cfg(test)]
mod api_tests;
#[cfg(test)]
mod lifecycle_tests;
#[cfg(test)]
mod submission_tests;
