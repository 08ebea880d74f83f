mod repository;

pub use repository::ObligationRepository;
