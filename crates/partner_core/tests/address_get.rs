use partner_core::db::open_db_in_memory;
use partner_core::{
    Partner, PartnerField, PartnerService, PartnerType, PartnerValues, SqlitePartnerRepository,
};
use rusqlite::Connection;
use std::collections::BTreeMap;

type Service<'conn> = PartnerService<SqlitePartnerRepository<'conn>>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> Service<'_> {
    PartnerService::new(SqlitePartnerRepository::try_new(conn).unwrap())
}

fn create(
    service: &Service<'_>,
    name: &str,
    parent: Option<&Partner>,
    partner_type: PartnerType,
    is_company: bool,
) -> Partner {
    let mut values = PartnerValues::new()
        .with(PartnerField::Name, name)
        .with(PartnerField::PartnerType, partner_type)
        .with(PartnerField::IsCompany, is_company);
    if let Some(parent) = parent {
        values.insert(PartnerField::Parent, parent.id);
    }
    service.create(&values).unwrap()
}

#[test]
fn finds_each_role_among_siblings_after_climbing() {
    let conn = setup();
    let service = service(&conn);
    let acme = create(&service, "Acme", None, PartnerType::Contact, true);
    let ada = create(&service, "Ada", Some(&acme), PartnerType::Contact, false);
    let billing = create(&service, "Billing", Some(&acme), PartnerType::Invoice, false);
    let dock = create(&service, "Dock", Some(&acme), PartnerType::Delivery, false);

    let result = service
        .address_get(&[ada.id], &[PartnerType::Invoice, PartnerType::Delivery])
        .unwrap();

    assert_eq!(
        result,
        BTreeMap::from([
            (PartnerType::Contact, ada.id),
            (PartnerType::Invoice, billing.id),
            (PartnerType::Delivery, dock.id),
        ])
    );
}

#[test]
fn missing_roles_default_to_contact_match() {
    let conn = setup();
    let service = service(&conn);
    let acme = create(&service, "Acme", None, PartnerType::Contact, true);
    create(&service, "Ada", Some(&acme), PartnerType::Contact, false);

    let result = service
        .address_get(&[acme.id], &[PartnerType::Delivery])
        .unwrap();
    assert_eq!(result[&PartnerType::Contact], acme.id);
    assert_eq!(result[&PartnerType::Delivery], acme.id);
}

#[test]
fn defaults_to_first_seed_without_any_contact() {
    let conn = setup();
    let service = service(&conn);
    let dock = create(&service, "Dock", None, PartnerType::Delivery, false);

    let result = service
        .address_get(&[dock.id], &[PartnerType::Invoice])
        .unwrap();
    assert_eq!(result[&PartnerType::Contact], dock.id);
    assert_eq!(result[&PartnerType::Invoice], dock.id);
    assert_eq!(result.len(), 2);
}

#[test]
fn empty_role_request_resolves_contact_only() {
    let conn = setup();
    let service = service(&conn);
    let acme = create(&service, "Acme", None, PartnerType::Contact, true);

    let result = service.address_get(&[acme.id], &[]).unwrap();
    assert_eq!(result, BTreeMap::from([(PartnerType::Contact, acme.id)]));
}

#[test]
fn empty_seed_list_yields_empty_map() {
    let conn = setup();
    let service = service(&conn);
    assert!(service
        .address_get(&[], &[PartnerType::Invoice])
        .unwrap()
        .is_empty());
}

#[test]
fn search_does_not_enter_nested_companies() {
    let conn = setup();
    let service = service(&conn);
    let group = create(&service, "Group", None, PartnerType::Contact, true);
    let subsidiary = create(&service, "Subsidiary", Some(&group), PartnerType::Contact, true);
    create(&service, "Sub Billing", Some(&subsidiary), PartnerType::Invoice, false);

    let result = service
        .address_get(&[group.id], &[PartnerType::Invoice])
        .unwrap();
    assert_eq!(result[&PartnerType::Invoice], group.id);
}

#[test]
fn climb_stops_at_company_boundary() {
    let conn = setup();
    let service = service(&conn);
    let group = create(&service, "Group", None, PartnerType::Contact, false);
    create(&service, "Group Billing", Some(&group), PartnerType::Invoice, false);
    let acme = create(&service, "Acme", Some(&group), PartnerType::Contact, true);
    let ada = create(&service, "Ada", Some(&acme), PartnerType::Contact, false);

    let result = service
        .address_get(&[ada.id], &[PartnerType::Invoice])
        .unwrap();
    assert_eq!(result[&PartnerType::Invoice], ada.id);
}

#[test]
fn nearest_descendant_wins_and_results_are_deterministic() {
    let conn = setup();
    let service = service(&conn);
    let acme = create(&service, "Acme", None, PartnerType::Contact, true);
    let ada = create(&service, "Ada", Some(&acme), PartnerType::Contact, false);
    let deep_billing = create(&service, "Deep Billing", Some(&ada), PartnerType::Invoice, false);
    let billing = create(&service, "Billing", Some(&acme), PartnerType::Invoice, false);

    let roles = [PartnerType::Invoice];
    let first = service.address_get(&[acme.id], &roles).unwrap();
    let second = service.address_get(&[acme.id], &roles).unwrap();

    assert_eq!(first, second);
    assert_eq!(first[&PartnerType::Invoice], billing.id);
    assert_ne!(first[&PartnerType::Invoice], deep_billing.id);
}

#[test]
fn later_seeds_continue_with_shared_visited_set() {
    let conn = setup();
    let service = service(&conn);
    let dock = create(&service, "Dock", None, PartnerType::Delivery, false);
    let acme = create(&service, "Acme", None, PartnerType::Contact, true);
    let billing = create(&service, "Billing", Some(&acme), PartnerType::Invoice, false);

    let result = service
        .address_get(
            &[dock.id, acme.id],
            &[PartnerType::Delivery, PartnerType::Invoice],
        )
        .unwrap();
    assert_eq!(result[&PartnerType::Delivery], dock.id);
    assert_eq!(result[&PartnerType::Contact], acme.id);
    assert_eq!(result[&PartnerType::Invoice], billing.id);
}
