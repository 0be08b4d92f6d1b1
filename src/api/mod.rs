pub mod error;
pub mod images;

pub use error::ApiError;

pub fn routes() -> Vec<rocket::Route> {
    routes![
        images::get_image,
        images::clear_memory,
        images::clear_disk,
        images::stats,
    ]
}
