pub mod devtools;
pub mod people;
pub mod post_detail;
pub mod posts;
pub mod terminal;
pub mod views;
