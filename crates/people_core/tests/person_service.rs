use people_core::db::open_db_in_memory;
use people_core::enrich::{EnrichResult, UpstreamFailure};
use people_core::repo::person_repo::RepoResult;
use people_core::{
    CountryCode, Deadline, EnrichError, EnrichmentClient, ErrorKind, FilterCriteria, Gender,
    Lookup, Person, PersonData, PersonId, PersonInput, PersonRepository, PersonService,
    RepoError, ServiceError, SqlitePersonRepository, Stage,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted lookups; `fail` selects which one errors.
#[derive(Default)]
struct MockClient {
    fail: Option<Lookup>,
    calls: AtomicUsize,
    age_names: Mutex<Vec<String>>,
    gender_names: Mutex<Vec<String>>,
}

impl MockClient {
    fn failing(lookup: Lookup) -> Self {
        Self {
            fail: Some(lookup),
            ..Self::default()
        }
    }

    fn outcome<T>(&self, lookup: Lookup, value: T) -> EnrichResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail == Some(lookup) {
            return Err(EnrichError::Upstream {
                lookup,
                failure: UpstreamFailure::Status(503),
            });
        }
        Ok(value)
    }
}

impl EnrichmentClient for MockClient {
    fn age(&self, name: &str, _deadline: &Deadline) -> EnrichResult<u32> {
        self.age_names.lock().unwrap().push(name.to_string());
        self.outcome(Lookup::Age, 42)
    }

    fn gender(&self, name: &str, _deadline: &Deadline) -> EnrichResult<Gender> {
        self.gender_names.lock().unwrap().push(name.to_string());
        self.outcome(Lookup::Gender, Gender::Male)
    }

    fn nationality(&self, _name: &str, _deadline: &Deadline) -> EnrichResult<CountryCode> {
        self.outcome(Lookup::Nationality, CountryCode::parse("ru").unwrap())
    }
}

/// Nationality lookup that blocks until its deadline is cancelled.
struct WaitsForCancel;

impl EnrichmentClient for WaitsForCancel {
    fn age(&self, _name: &str, _deadline: &Deadline) -> EnrichResult<u32> {
        Err(EnrichError::NoData(Lookup::Age))
    }

    fn gender(&self, _name: &str, _deadline: &Deadline) -> EnrichResult<Gender> {
        Ok(Gender::Female)
    }

    fn nationality(&self, _name: &str, deadline: &Deadline) -> EnrichResult<CountryCode> {
        for _ in 0..500 {
            if let Err(reason) = deadline.check() {
                return Err(EnrichError::Interrupted {
                    lookup: Lookup::Nationality,
                    reason,
                });
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("sibling failure never cancelled the nationality lookup");
    }
}

/// Store that only counts calls.
#[derive(Default)]
struct CountingStore {
    calls: AtomicUsize,
}

impl PersonRepository for CountingStore {
    fn create(&self, _data: &PersonData, _deadline: &Deadline) -> RepoResult<PersonId> {
        Ok(self.calls.fetch_add(1, Ordering::SeqCst) as PersonId + 1)
    }

    fn get_by_id(&self, id: PersonId, _deadline: &Deadline) -> RepoResult<Person> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepoError::NotFound(id))
    }

    fn get_all(&self, _criteria: &FilterCriteria, _deadline: &Deadline) -> RepoResult<Vec<Person>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }

    fn update(&self, id: PersonId, _data: &PersonData, _deadline: &Deadline) -> RepoResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepoError::NotFound(id))
    }

    fn delete(&self, id: PersonId, _deadline: &Deadline) -> RepoResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RepoError::NotFound(id))
    }
}

#[test]
fn create_persists_fully_enriched_person() {
    let conn = open_db_in_memory().unwrap();
    let service = PersonService::new(SqlitePersonRepository::new(&conn), MockClient::default());
    let deadline = Deadline::none();

    let created = service
        .create(
            PersonInput::new(" Ivan ", "Petrov").with_patronymic("Sergeevich"),
            &deadline,
        )
        .unwrap();
    assert_eq!(created.name, "Ivan");
    assert_eq!(created.age, Some(42));
    assert_eq!(created.gender, Some(Gender::Male));
    assert_eq!(created.nationality, CountryCode::parse("ru"));

    let loaded = service.get_by_id(created.id, &deadline).unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn only_age_lookup_receives_transliterated_name() {
    let store = CountingStore::default();
    let client = MockClient::default();
    let service = PersonService::new(&store, &client);

    service
        .create(PersonInput::new("Пётр", "Иванов"), &Deadline::none())
        .unwrap();

    assert_eq!(*client.age_names.lock().unwrap(), vec!["Pyotr".to_string()]);
    assert_eq!(*client.gender_names.lock().unwrap(), vec!["Пётр".to_string()]);
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn failed_lookup_persists_nothing() {
    let store = CountingStore::default();
    let service = PersonService::new(&store, MockClient::failing(Lookup::Gender));

    let err = service
        .create(PersonInput::new("Ivan", "Petrov"), &Deadline::none())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Upstream);
    assert_eq!(err.stage(), Some(Stage::GenderLookup));
    assert_eq!(err.operation(), "create");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn first_failure_cancels_sibling_lookups() {
    let store = CountingStore::default();
    let service = PersonService::new(&store, WaitsForCancel);

    let err = service
        .create(PersonInput::new("Ivan", "Petrov"), &Deadline::none())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NoData);
    assert_eq!(err.stage(), Some(Stage::AgeLookup));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn invalid_input_never_reaches_upstream() {
    let store = CountingStore::default();
    let client = MockClient::default();
    let service = PersonService::new(&store, &client);

    let err = service
        .create(PersonInput::new("I", "Petrov"), &Deadline::none())
        .unwrap_err();

    assert!(matches!(err, ServiceError::Validation { .. }));
    assert_eq!(err.stage(), Some(Stage::Validate));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn cancelled_caller_is_reported_as_cancelled() {
    let conn = open_db_in_memory().unwrap();
    let service = PersonService::new(SqlitePersonRepository::new(&conn), MockClient::default());
    let deadline = Deadline::none();
    deadline.cancel();

    let err = service
        .create(PersonInput::new("Ivan", "Petrov"), &deadline)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert_eq!(err.stage(), Some(Stage::Persist));

    let err = service.get_by_id(1, &deadline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!matches!(err, ServiceError::NotFound { .. }));

    let listed = service
        .get_all(&FilterCriteria::first_page(), &Deadline::none())
        .unwrap();
    assert!(listed.is_empty());
}

#[test]
fn pass_through_errors_name_their_operation() {
    let conn = open_db_in_memory().unwrap();
    let service = PersonService::new(SqlitePersonRepository::new(&conn), MockClient::default());
    let deadline = Deadline::none();
    let data = PersonData {
        name: "Ivan".to_string(),
        surname: "Petrov".to_string(),
        patronymic: None,
        age: None,
        gender: None,
        nationality: None,
    };

    let err = service.update(9, &data, &deadline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.operation(), "update");
    assert_eq!(err.stage(), None);

    let err = service.delete(9, &deadline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.operation(), "delete");

    let inverted = FilterCriteria {
        age_min: Some(30),
        age_max: Some(10),
        ..FilterCriteria::first_page()
    };
    let err = service.get_all(&inverted, &deadline).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.operation(), "get_all");
}

#[test]
fn update_then_list_reflects_changes() {
    let conn = open_db_in_memory().unwrap();
    let service = PersonService::new(SqlitePersonRepository::new(&conn), MockClient::default());
    let deadline = Deadline::none();

    let created = service
        .create(PersonInput::new("Ivan", "Petrov"), &deadline)
        .unwrap();
    let mut data = created.data();
    data.age = Some(18);
    service.update(created.id, &data, &deadline).unwrap();

    let adults = FilterCriteria {
        age_min: Some(21),
        ..FilterCriteria::first_page()
    };
    assert!(service.get_all(&adults, &deadline).unwrap().is_empty());

    service.delete(created.id, &deadline).unwrap();
    assert_eq!(
        service.get_by_id(created.id, &deadline).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[test]
fn update_trims_name_fields_like_create() {
    let conn = open_db_in_memory().unwrap();
    let service = PersonService::new(SqlitePersonRepository::new(&conn), MockClient::default());
    let deadline = Deadline::none();
    let created = service
        .create(PersonInput::new("Ivan", "Petrov"), &deadline)
        .unwrap();

    let mut data = created.data();
    data.name = "  Ivan ".to_string();
    data.surname = " Petrov-Vodkin ".to_string();
    data.patronymic = Some("   ".to_string());
    service.update(created.id, &data, &deadline).unwrap();

    let loaded = service.get_by_id(created.id, &deadline).unwrap();
    assert_eq!(loaded.name, "Ivan");
    assert_eq!(loaded.surname, "Petrov-Vodkin");
    assert_eq!(loaded.patronymic, None);
}
