pub(crate) mod helpers;
mod visitor;
