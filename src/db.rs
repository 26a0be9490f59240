pub mod user_repo;
pub use user_repo::UserRepository;
pub mod session_repo;
pub use session_repo::SessionRepository;
pub mod verification_repo;
pub use verification_repo::VerificationRepository;
pub mod rbac_repo;
pub use rbac_repo::RbacRepository;
pub mod tenancy_repo;
pub use tenancy_repo::TenancyRepository;
pub mod profile_repo;
pub use profile_repo::ProfileRepository;
pub mod settings_repo;
pub use settings_repo::SettingsRepository;
