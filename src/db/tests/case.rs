use chrono::{NaiveDate, TimeZone, Utc};

use crate::db::{CaseRecord, Database, DecisionDates, ResultRecord, StatusRecord};
use crate::guard::lifecycle::Lifecycle;
use crate::types::{Confidentiality, TypeRef};

pub fn run_case_tests(db: &Database) {
    let mut main = CaseRecord::new("case-main", TypeRef::local("zt-1"), Confidentiality::Intern);
    main.properties
        .insert("vervaldatum".to_string(), "2030-01-01".to_string());
    main.decisions.push(DecisionDates {
        effective_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        expiry_date: None,
    });

    let mut sub = CaseRecord::new(
        "case-sub",
        TypeRef::remote("https://other.example.com/catalogi/api/v1/zaaktypen/2"),
        Confidentiality::Openbaar,
    );
    sub.main_case = Some("case-main".to_string());

    db.with_transaction(|tx, _cache| {
        tx.create_case(&main)?;
        tx.create_case(&sub)
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        assert_eq!(tx.get_case("case-main").unwrap(), Some(main.clone()));
        assert_eq!(tx.get_case("missing").unwrap(), None);

        let subs = tx.list_sub_cases("case-main").unwrap();
        assert_eq!(subs, vec![sub.clone()]);
        assert!(tx.list_sub_cases("case-sub").unwrap().is_empty());
        Ok(())
    })
    .unwrap();

    main.lifecycle = Lifecycle::Closed;
    main.end_date = Some(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    main.archive_nomination = Some("blijvend_bewaren".to_string());
    main.archive_action_date = Some(NaiveDate::from_ymd_opt(2034, 6, 30).unwrap());
    main.suspended = true;
    main.ever_suspended = true;
    main.suspension_reason = Some("wachten".to_string());
    db.with_transaction(|tx, _cache| tx.update_case(&main))
        .unwrap();

    db.with_transaction(|tx, _cache| {
        let found = tx.get_case("case-main").unwrap().unwrap();
        assert_eq!(found, main);
        assert!(found.is_closed());
        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx, _cache| {
        assert_eq!(tx.get_result("case-main").unwrap(), None);

        tx.save_result(&ResultRecord {
            case_id: "case-main".to_string(),
            result_type: TypeRef::local("rt-1"),
        })?;
        tx.save_result(&ResultRecord {
            case_id: "case-main".to_string(),
            result_type: TypeRef::local("rt-2"),
        })?;

        let result = tx.get_result("case-main").unwrap().unwrap();
        assert_eq!(result.result_type, TypeRef::local("rt-2"));
        Ok(())
    })
    .unwrap();
}

pub fn run_status_tests(db: &Database) {
    let case = CaseRecord::new("case-status", TypeRef::local("zt-1"), Confidentiality::Intern);
    db.with_transaction(|tx, _cache| tx.create_case(&case))
        .unwrap();

    let first_at = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
    let second_at = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();

    let status = |set_at, is_final| StatusRecord {
        id: 0,
        case_id: "case-status".to_string(),
        status_type: TypeRef::local("st-1"),
        set_at,
        is_final,
    };

    // Insert out of order, listing is by time.
    let created = db
        .with_transaction(|tx, _cache| {
            let second = tx.create_status(&status(second_at, true))?;
            let first = tx.create_status(&status(first_at, false))?;
            Ok((first, second))
        })
        .unwrap();

    db.with_transaction(|tx, _cache| {
        let statuses = tx.list_statuses("case-status").unwrap();
        assert_eq!(statuses, vec![created.0.clone(), created.1.clone()]);
        assert!(tx.list_statuses("missing").unwrap().is_empty());
        Ok(())
    })
    .unwrap();

    // Two statuses of one case cannot share a timestamp.
    let result = db.with_transaction(|tx, _cache| tx.create_status(&status(first_at, false)));
    assert!(result.is_err());
}
