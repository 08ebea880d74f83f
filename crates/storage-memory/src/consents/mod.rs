mod repository;

pub use repository::ConsentRepository;
