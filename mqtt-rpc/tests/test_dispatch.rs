use mqtt_rpc::{
    dispatcher::{Dispatcher, Handler},
    message::{Id, Params, Request, Response, ResponsePayload},
    response_manager, HandlerError, RpcError,
};
use serde::Deserialize;
use serde_json::json;

fn arith_dispatcher() -> Dispatcher {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register("main", "add", |params: &Params| {
        let (a, b): (i64, i64) = params.parse()?;
        Ok(json!(a + b))
    });

    dispatcher.register("main", "foobar", |params: &Params| {
        #[derive(Deserialize)]
        struct FoobarParams {
            foo: String,
            bar: String,
        }

        let FoobarParams { foo, bar } = params.parse()?;
        Ok(json!(foo + &bar))
    });

    dispatcher
}

fn expect_error(response: &Response) -> &RpcError {
    match response.payload() {
        ResponsePayload::Error(e) => e,
        other => panic!("Expected an error payload, got {other:?}"),
    }
}

#[test]
fn test_register_and_lookup() {
    let dispatcher = arith_dispatcher();

    assert!(dispatcher.lookup("main", "add").is_some());
    assert!(dispatcher.lookup("main", "missing").is_none());
    assert!(dispatcher.lookup("other", "add").is_none());

    let mut methods: Vec<(String, String)> = dispatcher
        .methods()
        .map(|(service, method)| (service.to_owned(), method.to_owned()))
        .collect();
    methods.sort();

    assert_eq!(
        methods,
        vec![
            ("main".to_owned(), "add".to_owned()),
            ("main".to_owned(), "foobar".to_owned())
        ]
    );
}

#[test]
fn test_last_registration_wins() {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register("test", "echo", |_: &Params| Ok(json!("first")));
    dispatcher.register("test", "echo", |_: &Params| Ok(json!("second")));

    assert_eq!(dispatcher.len(), 1);

    let handler = dispatcher.lookup("test", "echo").unwrap();
    assert_eq!(handler(&Params::None).unwrap(), json!("second"));
}

#[test]
fn test_bulk_registration() {
    let mut dispatcher = Dispatcher::new();

    dispatcher.register_service(
        "arithmetics",
        [
            (
                "sum",
                Box::new(|params: &Params| {
                    let (a, b): (i64, i64) = params.parse()?;
                    Ok(json!(a + b))
                }) as Handler,
            ),
            (
                "neg",
                Box::new(|params: &Params| {
                    let (a,): (i64,) = params.parse()?;
                    Ok(json!(-a))
                }) as Handler,
            ),
        ],
    );

    dispatcher.register_mapping([(
        ("test".to_owned(), "echo".to_owned()),
        Box::new(|params: &Params| Ok(json!(params.args()))) as Handler,
    )]);

    assert_eq!(dispatcher.len(), 3);

    let sum = dispatcher.lookup("arithmetics", "sum").unwrap();
    assert_eq!(
        sum(&Params::positional([json!(2), json!(3)])).unwrap(),
        json!(5)
    );
}

#[test]
fn test_parse_error_response() {
    let response = response_manager::handle(b"not json", "main", "add", &arith_dispatcher())
        .expect("parse errors should be answered");

    assert_eq!(expect_error(&response).code, RpcError::PARSE_ERROR);
    assert_eq!(response.id(), None);
}

#[test]
fn test_invalid_request_response() {
    let response = response_manager::handle(
        br#"{"params": [1, 2], "id": 5, "extra": true}"#,
        "main",
        "add",
        &arith_dispatcher(),
    )
    .expect("invalid requests should be answered");

    assert_eq!(expect_error(&response).code, RpcError::INVALID_REQUEST);
    assert_eq!(response.id(), None);
}

#[test]
fn test_method_not_found() {
    let request = Request::new(Params::None, Id::Num(7)).to_bytes().unwrap();

    let response = response_manager::handle(&request, "main", "missing", &arith_dispatcher())
        .expect("unknown methods should be answered");

    assert_eq!(expect_error(&response).code, RpcError::METHOD_NOT_FOUND);
    assert_eq!(response.id(), Some(&Id::Num(7)));
}

#[test]
fn test_positional_call() {
    let request = Request::new(Params::positional([json!(1), json!(2)]), Id::Num(1))
        .to_bytes()
        .unwrap();

    let response = response_manager::handle(&request, "main", "add", &arith_dispatcher()).unwrap();

    assert_eq!(
        *response.payload(),
        ResponsePayload::Result(json!(3)),
        "add(1, 2) should respond with 3"
    );
}

#[test]
fn test_named_call() {
    let params = Params::named([("foo", json!("a")), ("bar", json!("b"))]);
    let request = Request::new(params, Id::Num(2)).to_bytes().unwrap();

    let response =
        response_manager::handle(&request, "main", "foobar", &arith_dispatcher()).unwrap();

    assert_eq!(*response.payload(), ResponsePayload::Result(json!("ab")));
    assert_eq!(response.id(), Some(&Id::Num(2)));
}

#[test]
fn test_domain_error_goes_verbatim() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register("main", "fail", |_: &Params| {
        Err(HandlerError::Rpc(RpcError::new(
            -31999,
            "out of cheese",
            Some(json!({"redo": "from start"})),
        )))
    });

    let request = Request::new(Params::None, Id::Num(3)).to_bytes().unwrap();
    let response = response_manager::handle(&request, "main", "fail", &dispatcher).unwrap();

    let error = expect_error(&response);
    assert_eq!(error.code, -31999);
    assert_eq!(error.message, "out of cheese");
    assert_eq!(error.data, Some(json!({"redo": "from start"})));
}

#[test]
fn test_invalid_params_heuristic() {
    // add expects two integers
    let params = Params::named([("foo", json!("a"))]);
    let request = Request::new(params, Id::Num(4)).to_bytes().unwrap();

    let response = response_manager::handle(&request, "main", "add", &arith_dispatcher()).unwrap();

    let error = expect_error(&response);
    assert_eq!(error.code, RpcError::INVALID_PARAMS);
    assert_eq!(error.data.as_ref().unwrap()["type"], json!("InvalidParams"));
}

#[test]
fn test_handler_fault_response() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register("main", "fail", |_: &Params| {
        Err(anyhow::anyhow!("disk on fire").into())
    });

    let request = Request::new(Params::None, Id::Num(5)).to_bytes().unwrap();
    let response = response_manager::handle(&request, "main", "fail", &dispatcher).unwrap();

    let error = expect_error(&response);
    assert_eq!(error.code, RpcError::SERVER_ERROR);

    let data = error.data.as_ref().unwrap();
    assert_eq!(data["type"], json!("HandlerFault"));
    assert_eq!(data["message"], json!("disk on fire"));
}

#[test]
fn test_handler_panic_is_contained() {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register("main", "fail", |_: &Params| panic!("oops"));
    dispatcher.register("main", "ok", |_: &Params| Ok(json!(1)));

    let request = Request::new(Params::None, Id::Num(6)).to_bytes().unwrap();
    let response = response_manager::handle(&request, "main", "fail", &dispatcher).unwrap();

    let error = expect_error(&response);
    assert_eq!(error.code, RpcError::SERVER_ERROR);
    assert_eq!(error.data.as_ref().unwrap()["type"], json!("Panic"));
    assert_eq!(error.data.as_ref().unwrap()["message"], json!("oops"));

    // The dispatcher survives the panic
    let request = Request::new(Params::None, Id::Num(7)).to_bytes().unwrap();
    let response = response_manager::handle(&request, "main", "ok", &dispatcher).unwrap();
    assert_eq!(*response.payload(), ResponsePayload::Result(json!(1)));
}

#[test]
fn test_notification_produces_no_response() {
    let notification = Request::notification(Params::positional([json!(1), json!(2)]))
        .to_bytes()
        .unwrap();

    let dispatcher = arith_dispatcher();

    assert!(response_manager::handle(&notification, "main", "add", &dispatcher).is_none());

    // Not even on handler faults or unknown methods
    assert!(response_manager::handle(&notification, "main", "missing", &dispatcher).is_none());

    let mut faulty = Dispatcher::new();
    faulty.register("main", "fail", |_: &Params| panic!("oops"));
    assert!(response_manager::handle(&notification, "main", "fail", &faulty).is_none());
}
