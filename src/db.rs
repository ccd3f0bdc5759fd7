pub mod user_repo;
pub use user_repo::UserRepository;
pub mod rbac_repo;
pub use rbac_repo::RbacRepository;
pub mod directory_repo;
pub use directory_repo::DirectoryRepository;
pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod phonebook_repo;
pub use phonebook_repo::PhonebookRepository;
pub mod lead_repo;
pub use lead_repo::LeadRepository;
pub mod contract_repo;
pub use contract_repo::ContractRepository;
pub mod deal_repo;
pub use deal_repo::DealRepository;
pub mod commission_repo;
pub use commission_repo::CommissionRepository;
pub mod target_repo;
pub use target_repo::TargetRepository;
pub mod activity_repo;
pub use activity_repo::ActivityRepository;
pub mod whatsapp_repo;
pub use whatsapp_repo::WhatsappRepository;

use sqlx::PgPool;

/// Todos os repositórios, montados uma vez sobre o mesmo pool.
#[derive(Clone)]
pub struct Repositories {
    pub users: UserRepository,
    pub rbac: RbacRepository,
    pub directory: DirectoryRepository,
    pub clients: ClientRepository,
    pub phonebook: PhonebookRepository,
    pub leads: LeadRepository,
    pub contracts: ContractRepository,
    pub deals: DealRepository,
    pub commissions: CommissionRepository,
    pub targets: TargetRepository,
    pub activity: ActivityRepository,
    pub whatsapp: WhatsappRepository,
}

impl Repositories {
    pub fn new(pool: &PgPool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            rbac: RbacRepository::new(pool.clone()),
            directory: DirectoryRepository::new(pool.clone()),
            clients: ClientRepository::new(),
            phonebook: PhonebookRepository::new(pool.clone()),
            leads: LeadRepository::new(pool.clone()),
            contracts: ContractRepository::new(pool.clone()),
            deals: DealRepository::new(pool.clone()),
            commissions: CommissionRepository::new(pool.clone()),
            targets: TargetRepository::new(pool.clone()),
            activity: ActivityRepository::new(pool.clone()),
            whatsapp: WhatsappRepository::new(pool.clone()),
        }
    }
}
