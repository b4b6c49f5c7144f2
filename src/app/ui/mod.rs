pub(super) mod catalogue;
mod details;
mod panels;
