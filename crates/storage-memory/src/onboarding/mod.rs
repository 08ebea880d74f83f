mod repository;

pub use repository::OnboardingJobRepository;
