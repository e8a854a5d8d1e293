pub mod client;
pub mod invoice;
pub mod product;
pub mod reservation;
pub mod return_record;
pub mod sale;
