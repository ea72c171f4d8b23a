use super::*;
use proptest::prelude::*;

fn columns() -> Vec<String> {
    ["id", "filename", "userid", "email"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn compile(q: &QueryState) -> OrmResult<Statement> {
    q.compile("files", &columns(), OrderPolicy::AllowList)
}

#[test]
fn fresh_state_selects_everything() {
    let stmt = compile(&QueryState::new()).unwrap();
    assert_eq!(stmt.to_named_sql(), "SELECT * FROM files");
}

#[test]
fn with_id_without_filter_targets_primary_key() {
    let mut q = QueryState::new();
    q.with_id(42);
    assert!(q.is_single());
    let stmt = compile(&q).unwrap();
    assert_eq!(
        stmt.to_named_sql(),
        "SELECT * FROM files WHERE id = :id LIMIT :limit"
    );
    assert_eq!(stmt.param("id"), Some(&Value::Int(42)));
    assert_eq!(stmt.param("limit"), Some(&Value::Int(1)));
}

#[test]
fn explicit_filter_wins_over_id() {
    let mut q = QueryState::new();
    q.with_id(42).with_filter([("email", "x@y.com")]);
    let stmt = compile(&q).unwrap();
    assert_eq!(
        stmt.to_named_sql(),
        "SELECT * FROM files WHERE email = :email"
    );
}

#[test]
fn full_chain_renders_clauses_in_order() {
    let mut q = QueryState::new();
    q.with_fields("id, filename")
        .with_filter([("userid", "> 1")])
        .with_order("filename")
        .with_direction(Direction::Asc)
        .with_limit(10, Some(20));
    let (sql, params) = compile(&q).unwrap().render().map(|(s, p)| (s, p.len())).unwrap();
    assert_eq!(
        sql,
        "SELECT id, filename FROM files WHERE userid > $1 ORDER BY filename ASC LIMIT $2 OFFSET $3"
    );
    assert_eq!(params, 3);
}

#[test]
fn offset_without_limit_is_ignored() {
    let mut q = QueryState::new();
    q.with_limit(5, Some(10)).select_all();
    assert_eq!(q.offset(), Some(10));
    assert_eq!(compile(&q).unwrap().to_named_sql(), "SELECT * FROM files");
}

#[test]
fn invalid_limit_surfaces_at_compile() {
    let mut q = QueryState::new();
    q.with_limit(0, None);
    assert!(q.build_error().is_some());
    assert!(matches!(compile(&q), Err(OrmError::Validation(_))));

    let mut q = QueryState::new();
    q.with_limit(3, Some(-1));
    assert!(compile(&q).is_err());
}

#[test]
fn later_valid_limit_replaces_a_rejected_one() {
    let mut q = QueryState::new();
    q.with_limit(0, None).with_limit(5, None);
    assert!(q.build_error().is_none());
    assert_eq!(q.limit(), Some(5));
    assert!(compile(&q).is_ok());

    let selects: [fn(&mut QueryState) -> &mut QueryState; 3] = [
        QueryState::select_first,
        QueryState::select_last,
        QueryState::select_all,
    ];
    for select in selects {
        let mut q = QueryState::new();
        q.with_limit(2, Some(-1));
        select(&mut q);
        assert!(q.build_error().is_none());
        assert!(compile(&q).is_ok());
    }
}

#[test]
fn select_last_orders_by_key_descending() {
    let mut q = QueryState::new();
    q.select_last();
    assert_eq!(
        compile(&q).unwrap().to_named_sql(),
        "SELECT * FROM files ORDER BY id DESC LIMIT :limit"
    );

    let mut q = QueryState::new();
    q.with_order("filename").select_last();
    assert_eq!(q.order(), Some("filename"));
}

#[test]
fn select_first_clears_direction() {
    let mut q = QueryState::new();
    q.select_last().select_first();
    assert_eq!(q.direction(), None);
    assert_eq!(q.limit(), Some(1));
}

#[test]
fn order_strip_removes_non_word_before_space() {
    assert_eq!(strip_order_expr("id DESC"), "id DESC");
    assert_eq!(strip_order_expr("id; DROP TABLE files"), "idDROP TABLE files");
    assert_eq!(strip_order_expr("id,filename"), "id,filename");
    assert_eq!(strip_order_expr("id, filename"), "idfilename");
}

#[test]
fn order_allow_list_rejects_unknown_terms() {
    let mut q = QueryState::new();
    q.with_order("id; DROP TABLE files");
    assert!(compile(&q).is_err());

    let mut q = QueryState::new();
    q.with_order("userid DESC,filename");
    assert_eq!(
        compile(&q).unwrap().to_named_sql(),
        "SELECT * FROM files ORDER BY userid DESC,filename"
    );

    let mut q = QueryState::new();
    q.with_order("email ASC NULLS");
    assert!(compile(&q).is_err());
}

#[test]
fn strip_only_policy_keeps_expression() {
    let mut q = QueryState::new();
    q.with_order("lower(email)");
    assert!(compile(&q).is_err());
    let stmt = q
        .compile("files", &columns(), OrderPolicy::StripOnly)
        .unwrap();
    assert_eq!(stmt.to_named_sql(), "SELECT * FROM files ORDER BY lower(email)");
}

#[test]
fn empty_filter_clears_conditions() {
    let mut q = QueryState::new();
    q.with_filter([("email", "x@y.com")]);
    assert_eq!(q.conditions().len(), 1);
    q.with_filter(Filter::new());
    assert!(q.conditions().is_empty());
}

#[test]
fn introspection_strings() {
    let mut q = QueryState::new();
    q.with_filter([("filename", "a.txt")])
        .with_fields(["id", "filename", "email"]);
    assert_eq!(q.conditions_sql(), "filename = :filename");
    assert_eq!(q.fields_sql(), "id, filename, email");
    q.with_fields("*");
    assert_eq!(q.fields_sql(), "*");
}

#[test]
fn reset_keeps_primary_key() {
    let mut q = QueryState::for_key("file_id");
    q.with_id(3).reset();
    assert_eq!(q, QueryState::for_key("file_id"));
    q.with_id(3);
    assert_eq!(
        compile(&q).map(|s| s.to_named_sql()).unwrap_or_default(),
        "SELECT * FROM files WHERE file_id = :file_id LIMIT :limit"
    );
}

#[derive(Debug, Clone)]
enum Step {
    Id(i64),
    Limit(i64, Option<i64>),
    Order(String),
    Desc,
    Filter(String, String),
    Fields(Vec<String>),
    First,
    Last,
    All,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        any::<i64>().prop_map(Step::Id),
        (-3i64..50, proptest::option::of(-3i64..50)).prop_map(|(l, o)| Step::Limit(l, o)),
        "[a-z ,;]{0,12}".prop_map(Step::Order),
        Just(Step::Desc),
        ("[a-z]{1,8}", "[a-z<> =]{0,8}").prop_map(|(f, v)| Step::Filter(f, v)),
        proptest::collection::vec("[a-z]{1,6}", 0..4).prop_map(Step::Fields),
        Just(Step::First),
        Just(Step::Last),
        Just(Step::All),
    ]
}

fn apply(q: &mut QueryState, s: &Step) {
    match s {
        Step::Id(id) => {
            q.with_id(*id);
        }
        Step::Limit(l, o) => {
            q.with_limit(*l, *o);
        }
        Step::Order(o) => {
            q.with_order(o);
        }
        Step::Desc => {
            q.with_direction(Direction::Desc);
        }
        Step::Filter(f, v) => {
            q.with_filter([(f.as_str(), v.as_str())]);
        }
        Step::Fields(fields) => {
            q.with_fields(fields.clone());
        }
        Step::First => {
            q.select_first();
        }
        Step::Last => {
            q.select_last();
        }
        Step::All => {
            q.select_all();
        }
    }
}

proptest! {
    #[test]
    fn reset_matches_fresh_state(steps in proptest::collection::vec(step(), 0..12)) {
        let mut q = QueryState::new();
        for s in &steps {
            apply(&mut q, s);
        }
        q.reset();
        prop_assert_eq!(&q, &QueryState::new());
        prop_assert_eq!(
            compile(&q).map(|s| s.to_named_sql()).ok(),
            Some("SELECT * FROM files".to_string())
        );
    }
}
