use partner_core::db::open_db_in_memory;
use partner_core::{
    Country, CountryState, Partner, PartnerField, PartnerRepoError, PartnerRepository,
    PartnerType, PartnerValidationError, PartnerValues, SqlitePartnerRepository,
};
use rusqlite::Connection;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn child_of(repo: &SqlitePartnerRepository<'_>, parent: &Partner, name: &str) -> Partner {
    let mut partner = Partner::new(name);
    partner.parent_id = Some(parent.id);
    partner.commercial_partner_id = parent.commercial_partner_id;
    repo.insert_partner(&partner).unwrap()
}

#[test]
fn insert_and_get_round_trip_all_columns() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let mut partner = Partner::new("Deco Addict");
    partner.is_company = true;
    partner.reference = "DA-01".to_string();
    partner.vat = "BE0477472701".to_string();
    partner.credit_limit = 1500.0;
    partner.website = "http://deco.example".to_string();
    partner.supplier = true;
    let stored = repo.insert_partner(&partner).unwrap();

    assert_eq!(stored.id, partner.id);
    assert_eq!(stored.reference, "DA-01");
    assert_eq!(stored.vat, "BE0477472701");
    assert_eq!(stored.credit_limit, 1500.0);
    assert!(stored.is_company);
    assert!(stored.supplier);
    assert!(stored.active);
    assert_eq!(stored.commercial_partner_id, partner.id);
    assert!(stored.created_at > 0);
}

#[test]
fn insert_rejects_unnamed_contact() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let err = repo.insert_partner(&Partner::new(" ")).unwrap_err();
    assert!(matches!(
        err,
        PartnerRepoError::Validation(PartnerValidationError::NameRequired)
    ));
}

#[test]
fn children_are_active_only_in_creation_order() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let root = repo.insert_partner(&Partner::new("Root")).unwrap();
    let zed = child_of(&repo, &root, "Zed");
    let amy = child_of(&repo, &root, "Amy");
    let mut gone = child_of(&repo, &root, "Gone");
    gone.active = false;
    repo.update_partner(&gone).unwrap();

    let ids: Vec<_> = repo
        .list_children(root.id)
        .unwrap()
        .into_iter()
        .map(|child| child.id)
        .collect();
    assert_eq!(ids, vec![zed.id, amy.id]);
}

#[test]
fn descendant_search_filters_by_type_at_any_depth() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let root = repo.insert_partner(&Partner::new("Root")).unwrap();
    let mid = child_of(&repo, &root, "Mid");
    let leaf = child_of(&repo, &mid, "Leaf");
    let mut invoice = Partner::new("Billing");
    invoice.parent_id = Some(mid.id);
    invoice.partner_type = PartnerType::Invoice;
    repo.insert_partner(&invoice).unwrap();

    let contacts = repo
        .list_descendant_ids(root.id, Some(PartnerType::Contact))
        .unwrap();
    assert_eq!(contacts, vec![mid.id, leaf.id]);

    let all = repo.list_descendant_ids(root.id, None).unwrap();
    assert_eq!(all.len(), 3);
    assert!(repo.list_descendant_ids(leaf.id, None).unwrap().is_empty());
}

#[test]
fn email_lookup_is_case_insensitive_and_skips_blank() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let mut raoul = Partner::new("Raoul");
    raoul.email = "Raoul@Grosbedon.fr".to_string();
    repo.insert_partner(&raoul).unwrap();
    repo.insert_partner(&Partner::new("No Mail")).unwrap();

    let found = repo.find_by_email("raoul@grosbedon.FR", 5).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, raoul.id);
    assert!(repo.find_by_email("", 5).unwrap().is_empty());
}

#[test]
fn search_matches_name_email_and_reference() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let mut by_ref = Partner::new("Alpha");
    by_ref.reference = "XREF-9".to_string();
    repo.insert_partner(&by_ref).unwrap();
    let mut by_mail = Partner::new("Beta");
    by_mail.email = "beta@xref.test".to_string();
    repo.insert_partner(&by_mail).unwrap();
    repo.insert_partner(&Partner::new("Gamma")).unwrap();

    let names: Vec<_> = repo
        .search_partners("xref", 10)
        .unwrap()
        .into_iter()
        .map(|partner| partner.name)
        .collect();
    assert_eq!(names, vec!["Alpha".to_string(), "Beta".to_string()]);

    assert!(repo.search_partners("100%", 10).unwrap().is_empty());
}

#[test]
fn countries_and_states_round_trip() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let country = Country::new("FR", "France").with_address_format("%(zip)s %(city)s");
    repo.insert_country(&country).unwrap();
    let state = CountryState::new(country.id, "IDF", "Ile-de-France");
    repo.insert_state(&state).unwrap();

    assert_eq!(repo.get_country(country.id).unwrap(), Some(country.clone()));
    assert_eq!(repo.get_state(state.id).unwrap(), Some(state));
}

#[test]
fn write_values_applies_map_without_side_effects() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();

    let parent = repo.insert_partner(&Partner::new("Parent")).unwrap();
    let child = child_of(&repo, &parent, "Child");

    repo.write_values(
        &[parent.id],
        &PartnerValues::new().with(PartnerField::Street, "1 Main St"),
    )
    .unwrap();

    assert_eq!(repo.require_partner(parent.id).unwrap().street, "1 Main St");
    assert_eq!(repo.require_partner(child.id).unwrap().street, "");
}

#[test]
fn rollback_discards_changes_of_atomic_scope() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();
    let partner = repo.insert_partner(&Partner::new("Stable")).unwrap();

    repo.begin_atomic().unwrap();
    repo.write_values(
        &[partner.id],
        &PartnerValues::new().with(PartnerField::Name, "Changed"),
    )
    .unwrap();
    repo.rollback_atomic().unwrap();
    assert_eq!(repo.require_partner(partner.id).unwrap().name, "Stable");

    repo.begin_atomic().unwrap();
    repo.write_values(
        &[partner.id],
        &PartnerValues::new().with(PartnerField::Name, "Committed"),
    )
    .unwrap();
    repo.commit_atomic().unwrap();
    assert_eq!(repo.require_partner(partner.id).unwrap().name, "Committed");
}

#[test]
fn missing_partner_is_reported() {
    let conn = setup();
    let repo = SqlitePartnerRepository::try_new(&conn).unwrap();
    let ghost = Partner::new("Ghost");

    assert!(repo.get_partner(ghost.id).unwrap().is_none());
    assert!(matches!(
        repo.update_partner(&ghost).unwrap_err(),
        PartnerRepoError::PartnerNotFound(id) if id == ghost.id
    ));
}
