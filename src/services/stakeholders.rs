// src/services/stakeholders.rs

// Cálculo do fan-out: quem entra em `selected_users` e quem recebe notificações.
// Tudo aqui é puro (sem banco), para ser testado isoladamente.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::models::auth::{Role, User};

/// Escopo da distribuição: criador + roteamento do registro.
#[derive(Debug, Clone, Copy)]
pub struct StakeholderContext {
    pub creator: Uuid,
    pub branch_id: Uuid,
    pub pipeline_id: Uuid,
    pub product_id: Uuid,
    // Lead do tipo "Marketing" também entra para Marketing e Developer
    pub is_marketing: bool,
}

/// Regras de distribuição por cargo.
#[derive(Debug, Clone)]
pub struct StakeholderRules {
    /// Entram sempre, independente do escopo.
    pub global_roles: Vec<Role>,
    /// Entram quando o produto está entre os produtos do usuário.
    pub product_roles: Vec<Role>,
    /// Entram quando filial e pipeline batem com os do usuário.
    pub branch_pipeline_roles: Vec<Role>,
    /// Entram apenas em leads de marketing.
    pub marketing_roles: Vec<Role>,
}

impl Default for StakeholderRules {
    fn default() -> Self {
        Self {
            global_roles: vec![Role::Ceo, Role::Md, Role::Admin, Role::Superadmin],
            product_roles: vec![Role::Hod, Role::Hom],
            branch_pipeline_roles: vec![Role::Manager],
            marketing_roles: vec![Role::Marketing, Role::Developer],
        }
    }
}

impl StakeholderRules {
    fn admits(&self, user: &User, ctx: &StakeholderContext) -> bool {
        if self.global_roles.contains(&user.role) {
            return true;
        }
        if self.product_roles.contains(&user.role) && user.product_ids.contains(&ctx.product_id) {
            return true;
        }
        if self.branch_pipeline_roles.contains(&user.role)
            && user.branch_id == Some(ctx.branch_id)
            && user.pipeline_ids.contains(&ctx.pipeline_id)
        {
            return true;
        }
        ctx.is_marketing && self.marketing_roles.contains(&user.role)
    }
}

/// Criador + todos os usuários ativos admitidos pelas regras no escopo dado.
pub fn resolve_stakeholders(
    ctx: &StakeholderContext,
    users: &[User],
    rules: &StakeholderRules,
) -> BTreeSet<Uuid> {
    let mut selected = BTreeSet::new();
    selected.insert(ctx.creator);

    selected.extend(
        users
            .iter()
            .filter(|u| u.is_active && rules.admits(u, ctx))
            .map(|u| u.id),
    );

    selected
}

/// Quem recebe a notificação dentre os selecionados.
#[derive(Debug, Clone, Copy)]
pub enum Audience<'a> {
    /// Todos os selecionados, menos quem agiu.
    Everyone,
    /// Selecionados sem estes cargos.
    Excluding(&'a [Role]),
    /// Só selecionados com estes cargos.
    Only(&'a [Role]),
}

/// Rejeição de lead não notifica a diretoria nem o time técnico.
pub const LEAD_REJECT_SILENCED: &[Role] = &[Role::Ceo, Role::Md, Role::Developer, Role::Admin];

/// Rejeição/restauração de deal vai para a gestão.
pub const DEAL_REJECT_AUDIENCE: &[Role] = &[Role::Manager, Role::Hod, Role::Md, Role::Ceo];

/// Filtra os selecionados pelo público, sempre sem o próprio autor da ação.
pub fn notification_recipients(
    selected: &[Uuid],
    users: &[User],
    actor: Uuid,
    audience: Audience<'_>,
) -> Vec<Uuid> {
    let role_of = |id: &Uuid| users.iter().find(|u| u.id == *id).map(|u| u.role);

    let mut recipients: Vec<Uuid> = selected
        .iter()
        .filter(|id| **id != actor)
        .filter(|id| match audience {
            Audience::Everyone => true,
            Audience::Excluding(roles) => role_of(id).is_none_or(|r| !roles.contains(&r)),
            Audience::Only(roles) => role_of(id).is_some_and(|r| roles.contains(&r)),
        })
        .copied()
        .collect();

    recipients.sort();
    recipients.dedup();
    recipients
}

/// União preservando a ordem: anteriores primeiro, depois os novos.
pub fn merge_users(previous: &[Uuid], extra: impl IntoIterator<Item = Uuid>) -> Vec<Uuid> {
    let mut merged = previous.to_vec();
    for id in extra {
        if !merged.contains(&id) {
            merged.push(id);
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: format!("{:?}", role),
            email: format!("{}@crm.ae", Uuid::new_v4()),
            password_hash: String::new(),
            role,
            branch_id: None,
            pipeline_ids: Vec::new(),
            product_ids: Vec::new(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ctx(creator: Uuid) -> StakeholderContext {
        StakeholderContext {
            creator,
            branch_id: Uuid::new_v4(),
            pipeline_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            is_marketing: false,
        }
    }

    #[test]
    fn creator_and_global_roles_are_always_selected() {
        let creator = Uuid::new_v4();
        let ceo = user(Role::Ceo);
        let md = user(Role::Md);
        let admin = user(Role::Admin);
        let superadmin = user(Role::Superadmin);
        let agent = user(Role::SalesAgent);

        let users = vec![ceo.clone(), md.clone(), admin.clone(), superadmin.clone(), agent.clone()];
        let selected = resolve_stakeholders(&ctx(creator), &users, &StakeholderRules::default());

        assert!(selected.contains(&creator));
        for id in [ceo.id, md.id, admin.id, superadmin.id] {
            assert!(selected.contains(&id));
        }
        assert!(!selected.contains(&agent.id));
    }

    #[test]
    fn hod_and_hom_are_scoped_by_product() {
        let c = ctx(Uuid::new_v4());

        let mut hod_in = user(Role::Hod);
        hod_in.product_ids = vec![c.product_id];
        let mut hom_in = user(Role::Hom);
        hom_in.product_ids = vec![Uuid::new_v4(), c.product_id];
        let mut hod_out = user(Role::Hod);
        hod_out.product_ids = vec![Uuid::new_v4()];

        let users = vec![hod_in.clone(), hom_in.clone(), hod_out.clone()];
        let selected = resolve_stakeholders(&c, &users, &StakeholderRules::default());

        assert!(selected.contains(&hod_in.id));
        assert!(selected.contains(&hom_in.id));
        assert!(!selected.contains(&hod_out.id));
    }

    #[test]
    fn managers_need_both_branch_and_pipeline() {
        let c = ctx(Uuid::new_v4());

        let mut both = user(Role::Manager);
        both.branch_id = Some(c.branch_id);
        both.pipeline_ids = vec![c.pipeline_id];

        let mut branch_only = user(Role::Manager);
        branch_only.branch_id = Some(c.branch_id);
        branch_only.pipeline_ids = vec![Uuid::new_v4()];

        let mut pipeline_only = user(Role::Manager);
        pipeline_only.branch_id = Some(Uuid::new_v4());
        pipeline_only.pipeline_ids = vec![c.pipeline_id];

        let users = vec![both.clone(), branch_only.clone(), pipeline_only.clone()];
        let selected = resolve_stakeholders(&c, &users, &StakeholderRules::default());

        assert!(selected.contains(&both.id));
        assert!(!selected.contains(&branch_only.id));
        assert!(!selected.contains(&pipeline_only.id));
    }

    #[test]
    fn marketing_roles_only_join_marketing_leads() {
        let marketing = user(Role::Marketing);
        let developer = user(Role::Developer);
        let users = vec![marketing.clone(), developer.clone()];
        let rules = StakeholderRules::default();

        let mut c = ctx(Uuid::new_v4());
        let plain = resolve_stakeholders(&c, &users, &rules);
        assert!(!plain.contains(&marketing.id));
        assert!(!plain.contains(&developer.id));

        c.is_marketing = true;
        let marketing_lead = resolve_stakeholders(&c, &users, &rules);
        assert!(marketing_lead.contains(&marketing.id));
        assert!(marketing_lead.contains(&developer.id));
    }

    #[test]
    fn inactive_users_are_ignored() {
        let mut ceo = user(Role::Ceo);
        ceo.is_active = false;
        let selected = resolve_stakeholders(&ctx(Uuid::new_v4()), &[ceo.clone()], &StakeholderRules::default());
        assert!(!selected.contains(&ceo.id));
    }

    #[test]
    fn custom_rules_change_the_outcome() {
        let accountant = user(Role::Accountant);
        let rules = StakeholderRules {
            global_roles: vec![Role::Accountant],
            product_roles: Vec::new(),
            branch_pipeline_roles: Vec::new(),
            marketing_roles: Vec::new(),
        };
        let selected = resolve_stakeholders(&ctx(Uuid::new_v4()), &[accountant.clone()], &rules);
        assert!(selected.contains(&accountant.id));
    }

    #[test]
    fn lead_reject_skips_leadership_and_the_actor() {
        let actor = user(Role::Manager);
        let ceo = user(Role::Ceo);
        let dev = user(Role::Developer);
        let agent = user(Role::SalesAgent);
        let users = vec![actor.clone(), ceo.clone(), dev.clone(), agent.clone()];
        let selected = vec![actor.id, ceo.id, dev.id, agent.id];

        let recipients = notification_recipients(
            &selected,
            &users,
            actor.id,
            Audience::Excluding(LEAD_REJECT_SILENCED),
        );

        assert_eq!(recipients, vec![agent.id]);
    }

    #[test]
    fn deal_reject_only_reaches_management() {
        let actor = user(Role::Accountant);
        let manager = user(Role::Manager);
        let hod = user(Role::Hod);
        let agent = user(Role::SalesAgent);
        let users = vec![actor.clone(), manager.clone(), hod.clone(), agent.clone()];
        let selected = vec![actor.id, manager.id, hod.id, agent.id];

        let mut expected = vec![manager.id, hod.id];
        expected.sort();

        let recipients =
            notification_recipients(&selected, &users, actor.id, Audience::Only(DEAL_REJECT_AUDIENCE));
        assert_eq!(recipients, expected);
    }

    #[test]
    fn merge_keeps_previous_users_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert_eq!(merge_users(&[a, b], [b, c]), vec![a, b, c]);
    }
}
