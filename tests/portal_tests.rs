#![allow(missing_docs)]

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{Contact, Customer, acme, add_contact, contact, customer_value, formatter};
use graphportal::portal::PortalResponse;
use graphportal::portal::LogicalLocation;
use graphportal::{
    ApplicationContext, AsyncLoader, Completion, ContextHandle, Criteria, DataAccess, DataPortal,
    Dispatcher, ErrorInfo, ExecutionLocation, LoopbackTransport, Mobile, OperationKind,
    GraphFormatter, NoCompression, PortalError, PortalHost, Principal, ReferenceId, RoleAuthorizer,
    Transport, TypeRegistry,
};

#[derive(Default)]
struct Journal {
    calls: AtomicUsize,
    seen: Mutex<Vec<(Option<String>, LogicalLocation)>>,
}

impl Journal {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn last_seen(&self) -> Option<(Option<String>, LogicalLocation)> {
        self.seen.lock().ok().and_then(|s| s.last().cloned())
    }
}

struct CustomerDal {
    journal: Arc<Journal>,
    parked: Mutex<Vec<Completion<i32>>>,
}

impl CustomerDal {
    fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            parked: Mutex::new(Vec::new()),
        }
    }

    fn record(&self, context: &ApplicationContext) {
        self.journal.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.journal.seen.lock() {
            seen.push((context.value("tenant").map(str::to_string), context.location()));
        }
    }
}

impl DataAccess<Customer> for CustomerDal {
    fn create(&self, criteria: &Criteria, context: &ApplicationContext) -> graphportal::Result<Customer> {
        self.record(context);
        let mut created = customer_value(&criteria.get::<String>(0)?, 0.0)?;
        created.is_new = true;
        Ok(created)
    }

    fn fetch(&self, criteria: &Criteria, context: &ApplicationContext) -> graphportal::Result<Customer> {
        self.record(context);
        let name = criteria.get::<String>(0)?;
        match name.as_str() {
            "missing" => Err(PortalError::Application("no customer named missing".into())),
            "busy" => {
                let fetched = customer_value("busy", 0.0)?;
                let parked: Arc<Mutex<Option<Completion<i32>>>> = Arc::new(Mutex::new(None));
                let slot = Arc::clone(&parked);
                let loader = AsyncLoader::new("Total", move |done| {
                    if let Ok(mut slot) = slot.lock() {
                        *slot = Some(done);
                    }
                });
                fetched.loads.start(&loader, |_, _| {});
                // Keep the load outstanding past the return.
                if let Some(done) = parked.lock().ok().and_then(|mut s| s.take())
                    && let Ok(mut all) = self.parked.lock()
                {
                    all.push(done);
                }
                Ok(fetched)
            }
            _ => {
                let mut fetched = customer_value(&name, 42.5)?;
                fetched.name.mark_clean();
                Ok(fetched)
            }
        }
    }

    fn update(&self, object: &Mobile<Customer>, context: &ApplicationContext) -> graphportal::Result<()> {
        self.record(context);
        let mut target = object.write()?;
        target.balance += 1.0;
        target.is_new = false;
        target.name.mark_clean();
        Ok(())
    }

    fn delete(&self, criteria: &Criteria, context: &ApplicationContext) -> graphportal::Result<()> {
        self.record(context);
        criteria.get::<String>(0).map(drop)
    }

    fn execute(&self, command: &Mobile<Customer>, context: &ApplicationContext) -> graphportal::Result<()> {
        self.record(context);
        command.write()?.balance = 0.0;
        Ok(())
    }
}

struct CountingTransport {
    inner: LoopbackTransport,
    sent: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for CountingTransport {
    fn send(&self, request: Vec<u8>) -> graphportal::Result<Vec<u8>> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        self.inner.send(request)
    }
}

struct BrokenTransport;

/// Answers every request with the same canned response frame.
struct CannedTransport {
    response: Vec<u8>,
}

#[async_trait]
impl Transport for CannedTransport {
    fn send(&self, _: Vec<u8>) -> graphportal::Result<Vec<u8>> {
        Ok(self.response.clone())
    }
}

#[async_trait]
impl Transport for BrokenTransport {
    fn send(&self, _: Vec<u8>) -> graphportal::Result<Vec<u8>> {
        Err(PortalError::Internal("link down".into()))
    }
}

struct Setup {
    journal: Arc<Journal>,
    sent: Arc<AtomicUsize>,
    host: Arc<PortalHost>,
    context: ContextHandle,
}

impl Setup {
    fn new() -> Self {
        let journal = Arc::new(Journal::default());
        let host = PortalHost::new(formatter()).with::<Customer, _>(CustomerDal::new(Arc::clone(&journal)));
        Self {
            journal,
            sent: Arc::new(AtomicUsize::new(0)),
            host: Arc::new(host),
            context: ContextHandle::default(),
        }
    }

    fn builder(&self, location: ExecutionLocation) -> graphportal::portal::DispatcherBuilder {
        let builder = Dispatcher::builder()
            .location(location)
            .formatter(formatter())
            .context(self.context.clone());
        match location {
            ExecutionLocation::Local => builder.host(Arc::clone(&self.host)),
            ExecutionLocation::Remote => builder.transport(CountingTransport {
                inner: LoopbackTransport::new(Arc::clone(&self.host)),
                sent: Arc::clone(&self.sent),
            }),
        }
    }

    fn portal(&self, location: ExecutionLocation) -> graphportal::Result<DataPortal<Customer>> {
        Ok(DataPortal::new(self.builder(location).build()?))
    }
}

fn named(name: &str) -> graphportal::Result<Criteria> {
    Criteria::new().with(name.to_string())
}

fn remote_parts(err: PortalError) -> Option<(OperationKind, String, Option<ErrorInfo>)> {
    match err {
        PortalError::RemoteExecution {
            operation,
            message,
            cause,
        } => Some((operation, message, cause.map(|c| (*c).clone()))),
        _ => None,
    }
}

const BOTH: [ExecutionLocation; 2] = [ExecutionLocation::Local, ExecutionLocation::Remote];

// --- TESTS ---

/// Fetch yields the same object shape in-process and over the transport.
#[test]
fn fetch_is_location_transparent() -> graphportal::Result<()> {
    let setup = Setup::new();
    for location in BOTH {
        let fetched = setup.portal(location)?.fetch(named("Acme")?)?;
        let guard = fetched.read()?;
        assert_eq!(guard.name.value().map(String::as_str), Some("Acme"));
        assert_eq!(guard.balance, 42.5);
    }
    assert_eq!(setup.journal.calls(), 2);
    assert_eq!(setup.sent.load(Ordering::SeqCst), 1);
    Ok(())
}

/// A data access failure has the same shape on both paths.
#[test]
fn failures_are_location_transparent() -> graphportal::Result<()> {
    let setup = Setup::new();
    let mut outcomes = Vec::new();
    for location in BOTH {
        let err = match setup.portal(location)?.fetch(named("missing")?) {
            Ok(_) => return Err(PortalError::Internal("fetch should fail".into())),
            Err(err) => err,
        };
        outcomes.push(remote_parts(err));
    }

    let local = outcomes[0].clone();
    assert_eq!(local, outcomes[1]);
    let Some((operation, message, cause)) = local else {
        return Err(PortalError::Internal("expected RemoteExecution".into()));
    };
    assert_eq!(operation, OperationKind::Fetch);
    assert_eq!(message, "fetch operation failed");
    let cause = cause.ok_or_else(|| PortalError::Internal("no cause".into()))?;
    assert_eq!(cause.kind, "Application");
    assert!(cause.root_cause().message.contains("no customer named missing"));
    Ok(())
}

/// Update returns a new instance carrying the changes made by data access code.
#[test]
fn update_returns_new_instance() -> graphportal::Result<()> {
    let setup = Setup::new();
    for location in BOTH {
        let portal = setup.portal(location)?;
        let original = Mobile::new(customer_value("Acme", 10.0)?);
        add_contact(&original, &contact("Ann")?)?;

        let updated = portal.update(&original)?;
        assert!(!updated.ptr_eq(&original));
        assert_eq!(updated.read()?.balance, 11.0);
        assert_eq!(original.read()?.balance, 10.0);
        assert!(!updated.read()?.name.local_dirty());
    }
    Ok(())
}

/// Without auto-clone, a local update runs against the caller's instance.
#[test]
fn update_without_clone_mutates_in_place() -> graphportal::Result<()> {
    let setup = Setup::new();
    let dispatcher = setup
        .builder(ExecutionLocation::Local)
        .auto_clone_on_update(false)
        .build()?;
    let original = Mobile::new(customer_value("Acme", 10.0)?);
    let updated = DataPortal::<Customer>::new(dispatcher).update(&original)?;
    assert!(updated.ptr_eq(&original));
    assert_eq!(original.read()?.balance, 11.0);
    Ok(())
}

/// Create, execute and delete run on both paths.
#[test]
fn remaining_operations_run() -> graphportal::Result<()> {
    let setup = Setup::new();
    for location in BOTH {
        let portal = setup.portal(location)?;
        let created = portal.create(named("Fresh")?)?;
        assert!(created.read()?.is_new);

        let command = Mobile::new(customer_value("Acme", 5.0)?);
        let executed = portal.execute(&command)?;
        assert_eq!(executed.read()?.balance, 0.0);

        portal.delete(named("Acme")?)?;
    }
    assert_eq!(setup.journal.calls(), 6);
    Ok(())
}

/// A denied principal never reaches data access code or the transport.
#[test]
fn denial_short_circuits() -> graphportal::Result<()> {
    let setup = Setup::new();
    setup.context.update(|ctx| {
        ctx.set_principal(Principal::authenticated("guest", ["Guest"]));
    });
    let authorizer = RoleAuthorizer::new().deny::<Customer>(OperationKind::Fetch, ["Guest"]);

    for location in BOTH {
        let dispatcher = setup.builder(location).authorizer(authorizer.clone()).build()?;
        let result = DataPortal::<Customer>::new(dispatcher).fetch(named("Acme")?);
        assert!(matches!(
            result,
            Err(PortalError::NotAuthorized {
                operation: OperationKind::Fetch,
                ..
            })
        ));
    }
    assert_eq!(setup.journal.calls(), 0);
    assert_eq!(setup.sent.load(Ordering::SeqCst), 0);
    Ok(())
}

/// A denied update leaves the caller's object alone and serializes nothing.
#[test]
fn denied_update_leaves_target_untouched() -> graphportal::Result<()> {
    let setup = Setup::new();
    setup.context.update(|ctx| {
        ctx.set_principal(Principal::authenticated("guest", ["Guest"]));
    });
    let authorizer = RoleAuthorizer::new().deny::<Customer>(OperationKind::Update, ["Guest"]);
    let target = Mobile::new(customer_value("Acme", 10.0)?);

    for location in BOTH {
        // An empty registry makes any clone or encode attempt fail with another error.
        let dispatcher = setup
            .builder(location)
            .formatter(GraphFormatter::new(Arc::new(TypeRegistry::new())))
            .authorizer(authorizer.clone())
            .build()?;
        let result = DataPortal::<Customer>::new(dispatcher).update(&target);
        assert!(matches!(
            result,
            Err(PortalError::NotAuthorized {
                operation: OperationKind::Update,
                ..
            })
        ));
    }

    let guard = target.read()?;
    assert_eq!(guard.balance, 10.0);
    assert!(guard.name.local_dirty());
    assert!(!guard.is_new);
    assert_eq!(setup.journal.calls(), 0);
    assert_eq!(setup.sent.load(Ordering::SeqCst), 0);
    Ok(())
}

/// Role rules let members through.
#[test]
fn allowed_role_passes() -> graphportal::Result<()> {
    let setup = Setup::new();
    setup.context.update(|ctx| {
        ctx.set_principal(Principal::authenticated("ann", ["Clerk"]));
    });
    let dispatcher = setup
        .builder(ExecutionLocation::Remote)
        .authorizer(RoleAuthorizer::new().allow::<Customer>(OperationKind::Fetch, ["Clerk", "Admin"]))
        .build()?;
    DataPortal::<Customer>::new(dispatcher).fetch(named("Acme")?)?;
    assert_eq!(setup.journal.calls(), 1);
    Ok(())
}

/// Missing criteria or targets are argument errors raised before any work.
#[test]
fn missing_arguments_are_rejected() -> graphportal::Result<()> {
    let setup = Setup::new();
    let dispatcher = setup.builder(ExecutionLocation::Remote).build()?;
    let key = "tests::Customer";

    let no_criteria = dispatcher.dispatch(OperationKind::Fetch, key, None, None);
    assert!(matches!(no_criteria, Err(PortalError::Argument(_))));

    let no_object = dispatcher.dispatch(OperationKind::Update, key, None, None);
    assert!(matches!(no_object, Err(PortalError::Argument(_))));

    let wrong_type = dispatcher.dispatch(OperationKind::Update, key, None, Some(contact("Ann")?.to_node()));
    assert!(matches!(wrong_type, Err(PortalError::Argument(_))));

    assert_eq!(setup.sent.load(Ordering::SeqCst), 0);
    Ok(())
}

/// Busy objects and child objects cannot be updated directly.
#[test]
fn busy_and_child_updates_are_rejected() -> graphportal::Result<()> {
    let setup = Setup::new();
    let portal = setup.portal(ExecutionLocation::Local)?;

    let busy = Mobile::new(customer_value("Acme", 1.0)?);
    let parked: Arc<Mutex<Option<Completion<i32>>>> = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&parked);
    let loader = AsyncLoader::new("Total", move |done| {
        if let Ok(mut slot) = slot.lock() {
            *slot = Some(done);
        }
    });
    busy.read()?.loads.start(&loader, |_, _| {});
    assert!(matches!(portal.update(&busy), Err(PortalError::Argument(_))));

    // Completing the load makes the object usable again.
    if let Some(done) = parked.lock().ok().and_then(|mut s| s.take()) {
        done.complete(Ok(1));
    }
    portal.update(&busy)?;

    let contacts = DataPortal::<Contact>::new(setup.builder(ExecutionLocation::Local).build()?);
    assert!(matches!(contacts.update(&contact("Ann")?), Err(PortalError::Argument(_))));
    Ok(())
}

/// A fetched object that is still busy fails post validation.
#[test]
fn busy_result_is_corrupt() -> graphportal::Result<()> {
    let setup = Setup::new();
    let result = setup.portal(ExecutionLocation::Local)?.fetch(named("busy")?);
    assert!(matches!(result, Err(PortalError::CorruptGraph(_))));
    Ok(())
}

/// A type without data access code fails like any other data access error.
#[test]
fn unregistered_handler_fails_remotely() -> graphportal::Result<()> {
    let setup = Setup::new();
    let portal = DataPortal::<Contact>::new(setup.builder(ExecutionLocation::Remote).build()?);
    let err = match portal.fetch(named("Ann")?) {
        Ok(_) => return Err(PortalError::Internal("fetch should fail".into())),
        Err(err) => err,
    };
    let (_, _, cause) = remote_parts(err).ok_or_else(|| PortalError::Internal("wrong kind".into()))?;
    assert_eq!(cause.map(|c| c.kind), Some("Application".to_string()));
    Ok(())
}

/// Transport failures surface as remote execution errors.
#[test]
fn transport_failure_is_remote_execution() -> graphportal::Result<()> {
    let dispatcher = Dispatcher::builder()
        .location(ExecutionLocation::Remote)
        .formatter(formatter())
        .transport(BrokenTransport)
        .build()?;
    let result = DataPortal::<Customer>::new(dispatcher).fetch(named("Acme")?);
    let (operation, _, cause) = result
        .err()
        .and_then(remote_parts)
        .ok_or_else(|| PortalError::Internal("expected RemoteExecution".into()))?;
    assert_eq!(operation, OperationKind::Fetch);
    assert!(cause.is_some_and(|c| c.message.contains("link down")));
    Ok(())
}

/// A returned graph that cannot be rebuilt is reported as corrupt, not as a remote failure.
#[test]
fn corrupt_response_graph_is_corrupt() -> graphportal::Result<()> {
    let mut payload = formatter().serialize(&acme()?.to_node())?;
    let root_id = payload.root;
    if let Some(root) = payload.records.iter_mut().find(|r| r.reference_id() == root_id) {
        root.add_child("contacts", ReferenceId::new(7), false);
    }
    let response = PortalResponse::Object(payload).to_bytes(&NoCompression)?;

    let dispatcher = Dispatcher::builder()
        .location(ExecutionLocation::Remote)
        .formatter(formatter())
        .transport(CannedTransport { response })
        .build()?;
    let result = DataPortal::<Customer>::new(dispatcher).fetch(named("Acme")?);
    assert!(matches!(result, Err(PortalError::CorruptGraph(_))));
    Ok(())
}

/// Builder rejects incomplete configurations.
#[test]
fn builder_requires_endpoint() {
    let local = Dispatcher::builder().formatter(formatter()).build();
    assert!(matches!(local, Err(PortalError::InvalidArgument(_))));

    let remote = Dispatcher::builder()
        .location(ExecutionLocation::Remote)
        .formatter(formatter())
        .build();
    assert!(matches!(remote, Err(PortalError::InvalidArgument(_))));

    let setup = Setup::new();
    let bad_compression = setup.builder(ExecutionLocation::Remote).compression(200).build();
    assert!(matches!(bad_compression, Err(PortalError::InvalidArgument(_))));
}

/// Data access code sees the caller's context values, on the server side.
#[test]
fn context_reaches_data_access() -> graphportal::Result<()> {
    let setup = Setup::new();
    setup.context.replace(ApplicationContext::new().with_value("tenant", "north"));
    for location in BOTH {
        setup.portal(location)?.fetch(named("Acme")?)?;
        assert_eq!(
            setup.journal.last_seen(),
            Some((Some("north".to_string()), LogicalLocation::Server))
        );
    }
    assert_eq!(setup.context.snapshot().location(), LogicalLocation::Client);
    Ok(())
}

/// Callback operations use the context captured when they were started.
#[test]
fn callback_uses_context_snapshot() -> graphportal::Result<()> {
    let setup = Setup::new();
    setup.context.replace(ApplicationContext::new().with_value("tenant", "north"));
    let portal = setup.portal(ExecutionLocation::Remote)?;

    let (tx, rx) = mpsc::channel();
    portal.begin_fetch(named("Acme")?, move |outcome| {
        let _ = tx.send(outcome.map(|c| c.read().map(|g| g.balance)));
    });
    setup.context.replace(ApplicationContext::new().with_value("tenant", "south"));

    let balance = rx
        .recv_timeout(Duration::from_secs(10))
        .map_err(|e| PortalError::Internal(e.to_string()))???;
    assert_eq!(balance, 42.5);
    assert_eq!(
        setup.journal.last_seen().and_then(|(tenant, _)| tenant),
        Some("north".to_string())
    );
    Ok(())
}

/// Callback delete reports exactly once.
#[test]
fn callback_delete_completes() -> graphportal::Result<()> {
    let setup = Setup::new();
    let portal = setup.portal(ExecutionLocation::Local)?;
    let (tx, rx) = mpsc::channel();
    portal.begin_delete(named("Acme")?, move |outcome| {
        let _ = tx.send(outcome);
    });
    rx.recv_timeout(Duration::from_secs(10))
        .map_err(|e| PortalError::Internal(e.to_string()))??;
    assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    Ok(())
}

/// The async shape gives the same results on both paths.
#[tokio::test]
async fn async_operations_match_blocking() -> graphportal::Result<()> {
    let setup = Setup::new();
    for location in BOTH {
        let portal = setup.portal(location)?;
        let fetched = portal.fetch_async(named("Acme")?).await?;
        assert_eq!(fetched.read()?.balance, 42.5);

        let updated = portal.update_async(&fetched).await?;
        assert!(!updated.ptr_eq(&fetched));
        assert_eq!(updated.read()?.balance, 43.5);

        let failed = portal.fetch_async(named("missing")?).await;
        assert!(matches!(failed, Err(PortalError::RemoteExecution { .. })));
    }
    Ok(())
}

/// Denial is reported by the async path before the transport runs.
#[tokio::test]
async fn async_denial_short_circuits() -> graphportal::Result<()> {
    let setup = Setup::new();
    let dispatcher = setup
        .builder(ExecutionLocation::Remote)
        .authorizer(|_: OperationKind, _: &str, principal: &Principal| principal.is_authenticated())
        .build()?;
    let result = DataPortal::<Customer>::new(dispatcher)
        .fetch_async(named("Acme")?)
        .await;
    assert!(matches!(result, Err(PortalError::NotAuthorized { .. })));
    assert_eq!(setup.sent.load(Ordering::SeqCst), 0);
    Ok(())
}
