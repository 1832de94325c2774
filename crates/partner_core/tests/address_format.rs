use partner_core::db::open_db_in_memory;
use partner_core::{
    parse_default_address, Country, CountryState, Partner, PartnerField, PartnerRepository,
    PartnerService, PartnerServiceError, PartnerValues, SqlitePartnerRepository,
};
use rusqlite::Connection;

type Service<'conn> = PartnerService<SqlitePartnerRepository<'conn>>;

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> Service<'_> {
    PartnerService::new(SqlitePartnerRepository::try_new(conn).unwrap())
}

fn located(service: &Service<'_>, name: &str, country: &Country, state: Option<&CountryState>) -> Partner {
    let mut values = PartnerValues::new()
        .with(PartnerField::Name, name)
        .with(PartnerField::Street, "1600 Amphitheatre Pkwy")
        .with(PartnerField::Street2, "Building 40")
        .with(PartnerField::City, "Mountain View")
        .with(PartnerField::Zip, "94043")
        .with(PartnerField::Country, country.id);
    if let Some(state) = state {
        values.insert(PartnerField::State, state.id);
    }
    service.create(&values).unwrap()
}

#[test]
fn default_layout_round_trips_through_parser() {
    let conn = setup();
    let service = service(&conn);
    let usa = Country::new("US", "United States");
    service.repo().insert_country(&usa).unwrap();
    let california = CountryState::new(usa.id, "CA", "California");
    service.repo().insert_state(&california).unwrap();
    let partner = located(&service, "Plex", &usa, Some(&california));

    let rendered = service.format_address(partner.id, false).unwrap();
    assert_eq!(
        rendered,
        "1600 Amphitheatre Pkwy\nBuilding 40\nMountain View CA 94043\nUnited States"
    );

    let parsed = parse_default_address(&rendered, &[california.code.as_str()]).unwrap();
    assert_eq!(parsed.street, partner.street);
    assert_eq!(parsed.street2, partner.street2);
    assert_eq!(parsed.city, partner.city);
    assert_eq!(parsed.state_code, "CA");
    assert_eq!(parsed.zip, partner.zip);
    assert_eq!(parsed.country_name, "United States");
}

#[test]
fn country_layout_overrides_default() {
    let conn = setup();
    let service = service(&conn);
    let france = Country::new("FR", "France")
        .with_address_format("%(street)s\n%(zip)s %(city)s\n%(country_code)s");
    service.repo().insert_country(&france).unwrap();
    let partner = located(&service, "Bureau", &france, None);

    assert_eq!(
        service.contact_address(partner.id).unwrap(),
        "1600 Amphitheatre Pkwy\n94043 Mountain View\nFR"
    );
}

#[test]
fn company_line_is_prepended_when_requested() {
    let conn = setup();
    let service = service(&conn);
    let usa = Country::new("US", "United States");
    service.repo().insert_country(&usa).unwrap();
    let acme = service
        .create(
            &PartnerValues::new()
                .with(PartnerField::Name, "Acme")
                .with(PartnerField::IsCompany, true)
                .with(PartnerField::Street, "1 Main St")
                .with(PartnerField::City, "Springfield")
                .with(PartnerField::Country, usa.id),
        )
        .unwrap();
    let ada = service
        .create(
            &PartnerValues::new()
                .with(PartnerField::Name, "Ada")
                .with(PartnerField::Parent, acme.id),
        )
        .unwrap();

    let with_company = service.format_address(ada.id, true).unwrap();
    assert_eq!(with_company, "Acme\n1 Main St\n\nSpringfield  \nUnited States");
    let parsed = parse_default_address(&with_company, &[]).unwrap();
    assert_eq!(parsed.company_name, "Acme");
    assert_eq!(parsed.city, "Springfield");

    assert!(!service.format_address(ada.id, false).unwrap().starts_with("Acme"));
}

#[test]
fn unknown_placeholder_fails_rendering() {
    let conn = setup();
    let service = service(&conn);
    let mars = Country::new("MA", "Mars").with_address_format("%(street)s\n%(crater)s");
    service.repo().insert_country(&mars).unwrap();
    let partner = located(&service, "Rover", &mars, None);

    match service.format_address(partner.id, false).unwrap_err() {
        PartnerServiceError::TemplateRender(err) => {
            assert!(err.message.contains("crater"));
            assert_eq!(err.template, "%(street)s\n%(crater)s");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn partner_without_country_uses_default_layout() {
    let conn = setup();
    let service = service(&conn);
    let partner = service
        .create(
            &PartnerValues::new()
                .with(PartnerField::Name, "Nomad")
                .with(PartnerField::City, "Nowhere"),
        )
        .unwrap();

    assert_eq!(service.format_address(partner.id, true).unwrap(), "\n\nNowhere  \n");
}

#[test]
fn zips_with_spaces_round_trip_with_and_without_state() {
    let conn = setup();
    let service = service(&conn);
    let uk = Country::new("GB", "United Kingdom");
    service.repo().insert_country(&uk).unwrap();
    let netherlands = Country::new("NL", "Netherlands");
    service.repo().insert_country(&netherlands).unwrap();
    let holland = CountryState::new(netherlands.id, "NH", "Noord-Holland");
    service.repo().insert_state(&holland).unwrap();

    let london = service
        .create(
            &PartnerValues::new()
                .with(PartnerField::Name, "Cabinet Office")
                .with(PartnerField::Street, "10 Downing St")
                .with(PartnerField::City, "London")
                .with(PartnerField::Zip, "SW1A 2AA")
                .with(PartnerField::Country, uk.id),
        )
        .unwrap();
    let amsterdam = service
        .create(
            &PartnerValues::new()
                .with(PartnerField::Name, "Paleis")
                .with(PartnerField::Street, "Dam 1")
                .with(PartnerField::City, "Amsterdam")
                .with(PartnerField::Zip, "1012 JS")
                .with(PartnerField::State, holland.id)
                .with(PartnerField::Country, netherlands.id),
        )
        .unwrap();

    let rendered = service.format_address(london.id, false).unwrap();
    let parsed = parse_default_address(&rendered, &[]).unwrap();
    assert_eq!(parsed.city, london.city);
    assert_eq!(parsed.state_code, "");
    assert_eq!(parsed.zip, london.zip);

    let rendered = service.format_address(amsterdam.id, false).unwrap();
    assert_eq!(rendered, "Dam 1\n\nAmsterdam NH 1012 JS\nNetherlands");
    assert!(parse_default_address(&rendered, &[]).is_none());
    let parsed = parse_default_address(&rendered, &[holland.code.as_str()]).unwrap();
    assert_eq!(parsed.city, amsterdam.city);
    assert_eq!(parsed.state_code, "NH");
    assert_eq!(parsed.zip, amsterdam.zip);
}
