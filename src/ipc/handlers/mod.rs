pub mod auth;
pub mod core;
pub mod courses;
pub mod dashboard;
pub mod enrollments;
pub mod guardians;
pub mod students;
pub mod subjects;
pub mod users;
