//! Test doubles for the repository layer.

mod mock_record_repository;

#[allow(unused_imports)]
pub use mock_record_repository::MockRecordRepository;
