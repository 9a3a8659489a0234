mod catalog;
mod helpers;
mod payments;
mod users;
