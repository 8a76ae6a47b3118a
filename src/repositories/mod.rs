mod crm_record_repository;
mod traits;

pub use crm_record_repository::CrmRecordRepository;
pub use traits::RecordRepository;
