//! Contact form controller
//!
//! Owns the form fields and the submission phase, and performs exactly one
//! webhook delivery per accepted submit. Phase changes go through
//! [`SubmissionStateMachine`]; the state is never borrowed across the
//! network call or while a notifier runs.

use std::cell::{Cell, RefCell, RefMut};

use url::Url;

use crate::app::notify::{Notification, Notifier};
use crate::app::state::{
    RejectReason, SubmissionEvent, SubmissionPhase, SubmissionStateMachine, Transition,
};
use crate::config::WebhookConfig;
use crate::domain::form::{FormField, FormState};
use crate::platform::webhook::{DeliveryReceipt, ReqwestTransport, WebhookError, WebhookTransport};

/// Errors returned by [`SubmissionController::submit`]
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("A submission is already in progress")]
    AlreadyInProgress,

    #[error("The form has already been submitted")]
    AlreadySubmitted,

    #[error("The form controller has been disposed")]
    Disposed,

    #[error("Submission failed: {0}")]
    Delivery(#[from] WebhookError),
}

/// Mutable controller state
#[derive(Debug, Default)]
struct ControllerState {
    form: FormState,
    phase: SubmissionPhase,
}

/// Contact form controller
///
/// Generic over the transport so tests can observe every request without
/// a network.
pub struct SubmissionController<T> {
    endpoint: Url,
    transport: T,
    notifier: Box<dyn Notifier>,
    state: RefCell<ControllerState>,
    disposed: Cell<bool>,
}

impl SubmissionController<ReqwestTransport> {
    /// Creates a controller posting over HTTP to the configured endpoint
    pub fn from_config(
        config: &WebhookConfig,
        notifier: impl Notifier + 'static,
    ) -> Result<Self, WebhookError> {
        let transport = ReqwestTransport::new(config.timeout())?;
        Ok(Self::new(config.endpoint.clone(), transport, notifier))
    }
}

impl<T: WebhookTransport> SubmissionController<T> {
    /// Creates a controller with an empty form in the `Idle` phase
    pub fn new(endpoint: Url, transport: T, notifier: impl Notifier + 'static) -> Self {
        Self {
            endpoint,
            transport,
            notifier: Box::new(notifier),
            state: RefCell::new(ControllerState::default()),
            disposed: Cell::new(false),
        }
    }

    /// Endpoint every submission is posted to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Current submission phase
    pub fn phase(&self) -> SubmissionPhase {
        self.state().phase
    }

    /// Whether a request is in flight (the submit trigger should be disabled)
    pub fn is_submitting(&self) -> bool {
        self.phase().is_in_flight()
    }

    /// Snapshot of every field value
    pub fn form(&self) -> FormState {
        self.state().form.clone()
    }

    /// Stores a raw field value
    ///
    /// Never validates, never sends anything and never touches the phase.
    pub fn update_field(&self, field: FormField, value: impl Into<String>) {
        self.state().form.set(field, value);
    }

    /// Sends the current form to the endpoint
    ///
    /// Only one submission may be in flight; a submit while `Submitting`
    /// returns [`SubmitError::AlreadyInProgress`] without any I/O. Every
    /// delivery failure lands in `Failed` with one generic notification;
    /// the detailed error is logged and returned to the caller.
    pub async fn submit(&self) -> Result<DeliveryReceipt, SubmitError> {
        if self.is_disposed() {
            return Err(SubmitError::Disposed);
        }

        let payload = {
            let mut state = self.state();
            match SubmissionStateMachine::process_event(
                state.phase,
                SubmissionEvent::SubmitRequested,
            ) {
                Transition::Moved(next) => state.phase = next,
                Transition::Rejected(RejectReason::AlreadySubmitted) => {
                    log::debug!("Ignoring submit: form already submitted");
                    return Err(SubmitError::AlreadySubmitted);
                }
                Transition::Rejected(reason) => {
                    log::debug!("Ignoring submit: {reason:?}");
                    return Err(SubmitError::AlreadyInProgress);
                }
            }
            state.form.to_payload()
        };

        let flight = InFlight::new(self);
        let result = match payload {
            Ok(body) => {
                log::debug!("Posting contact form to {}", self.endpoint);
                self.transport.deliver(&self.endpoint, body).await
            }
            Err(error) => Err(WebhookError::from(error)),
        };
        flight.settle(result)
    }

    /// Re-arms a settled form back to `Idle`
    pub fn reset(&self) -> Transition {
        let mut state = self.state();
        let transition = SubmissionStateMachine::process_event(state.phase, SubmissionEvent::Reset);
        state.phase = transition.phase_or(state.phase);
        transition
    }

    /// Marks the controller as torn down
    ///
    /// A submission still in flight completes, but its outcome is
    /// discarded instead of being applied.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if self.is_submitting() {
            log::debug!("Submission controller disposed with a delivery in flight");
        } else {
            log::debug!("Submission controller disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Applies the outcome of a settled delivery
    fn finish(
        &self,
        result: Result<DeliveryReceipt, WebhookError>,
    ) -> Result<DeliveryReceipt, SubmitError> {
        if self.is_disposed() {
            log::debug!("Discarding submission outcome for disposed controller");
            return result.map_err(SubmitError::from);
        }

        let event = match result {
            Ok(_) => SubmissionEvent::DeliverySucceeded,
            Err(_) => SubmissionEvent::DeliveryFailed,
        };
        self.apply(event);

        match &result {
            Ok(receipt) => {
                log::info!("Contact form accepted with status {}", receipt.status);
                self.notifier.notify(&Notification::SENT);
            }
            Err(error) => {
                log::error!("Contact form submission failed: {error}");
                self.notifier.notify(&Notification::FAILED);
            }
        }

        result.map_err(SubmitError::from)
    }

    fn apply(&self, event: SubmissionEvent) {
        let mut state = self.state();
        let transition = SubmissionStateMachine::process_event(state.phase, event);
        state.phase = transition.phase_or(state.phase);
    }

    fn state(&self) -> RefMut<'_, ControllerState> {
        self.state.borrow_mut()
    }
}

/// Settles the in-flight submission exactly once
///
/// If the submit future is dropped before the delivery resolves, or the
/// transport panics, the submission is settled as failed on drop.
struct InFlight<'a, T: WebhookTransport> {
    controller: &'a SubmissionController<T>,
    settled: bool,
}

impl<'a, T: WebhookTransport> InFlight<'a, T> {
    fn new(controller: &'a SubmissionController<T>) -> Self {
        Self {
            controller,
            settled: false,
        }
    }

    fn settle(
        mut self,
        result: Result<DeliveryReceipt, WebhookError>,
    ) -> Result<DeliveryReceipt, SubmitError> {
        self.settled = true;
        self.controller.finish(result)
    }
}

impl<T: WebhookTransport> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.settled || self.controller.is_disposed() {
            return;
        }
        log::warn!("Contact form submission abandoned before it settled");
        self.controller.apply(SubmissionEvent::DeliveryFailed);
        self.controller.notifier.notify(&Notification::FAILED);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::notify::NotificationKind;
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::Notify;

    #[derive(Clone, Copy)]
    enum Outcome {
        Status(u16),
        Unreachable,
    }

    /// Transport that records every body and answers from a script
    #[derive(Clone)]
    struct ScriptedTransport {
        outcomes: Arc<Mutex<Vec<Outcome>>>,
        requests: Arc<Mutex<Vec<Vec<u8>>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedTransport {
        fn answering(outcomes: &[Outcome]) -> Self {
            Self {
                outcomes: Arc::new(Mutex::new(outcomes.iter().rev().copied().collect())),
                requests: Arc::new(Mutex::new(Vec::new())),
                gate: None,
            }
        }

        /// Holds every request until the gate is opened
        fn gated(outcome: Outcome) -> (Self, Arc<Notify>) {
            let gate = Arc::new(Notify::new());
            let mut transport = Self::answering(&[outcome]);
            transport.gate = Some(Arc::clone(&gate));
            (transport, gate)
        }

        fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        fn last_body(&self) -> serde_json::Value {
            let requests = self.requests.lock().unwrap();
            serde_json::from_slice(requests.last().unwrap()).unwrap()
        }
    }

    impl WebhookTransport for ScriptedTransport {
        async fn deliver(
            &self,
            _endpoint: &Url,
            body: Vec<u8>,
        ) -> Result<DeliveryReceipt, WebhookError> {
            self.requests.lock().unwrap().push(body);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            let outcome = self
                .outcomes
                .lock()
                .unwrap()
                .pop()
                .unwrap_or(Outcome::Status(200));
            match outcome {
                Outcome::Status(status) => crate::platform::webhook::receipt_for_status(status),
                Outcome::Unreachable => Err(WebhookError::Transport {
                    reason: "connection refused".into(),
                }),
            }
        }
    }

    type Inbox = Rc<RefCell<Vec<Notification>>>;

    fn controller(
        transport: ScriptedTransport,
    ) -> (SubmissionController<ScriptedTransport>, Inbox) {
        let inbox: Inbox = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&inbox);
        let endpoint = Url::parse("http://localhost:5678/webhook/contact-form").unwrap();
        let controller = SubmissionController::new(endpoint, transport, move |n: &Notification| {
            sink.borrow_mut().push(n.clone())
        });
        fill(&controller);
        (controller, inbox)
    }

    fn fill<T: WebhookTransport>(controller: &SubmissionController<T>) {
        controller.update_field(FormField::FirstName, "Ada");
        controller.update_field(FormField::LastName, "Lovelace");
        controller.update_field(FormField::Email, "ada@example.com");
        controller.update_field(FormField::Phone, "+44 20 7946 0000");
        controller.update_field(FormField::Company, "Analytical Engines");
        controller.update_field(FormField::Country, "United Kingdom");
        controller.update_field(FormField::Message, "Let's talk.");
    }

    async fn wait_for_flight<T: WebhookTransport>(controller: &SubmissionController<T>) {
        while !controller.is_submitting() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn successful_submission_sends_all_fields_once() {
        let transport = ScriptedTransport::answering(&[Outcome::Status(200)]);
        let (controller, inbox) = controller(transport.clone());

        let receipt = controller.submit().await.unwrap();

        assert_eq!(receipt.status, 200);
        assert_eq!(controller.phase(), SubmissionPhase::Submitted);
        assert_eq!(transport.request_count(), 1);

        let body = transport.last_body();
        let object = body.as_object().unwrap();
        assert_eq!(object.len(), 8);
        for field in FormField::ALL {
            assert!(object.contains_key(field.wire_name()));
        }
        assert_eq!(object["email"], "ada@example.com");

        assert_eq!(*inbox.borrow(), vec![Notification::SENT]);
    }

    #[tokio::test]
    async fn server_error_fails_with_generic_notification() {
        let transport = ScriptedTransport::answering(&[Outcome::Status(500)]);
        let (controller, inbox) = controller(transport.clone());

        let result = controller.submit().await;

        assert!(matches!(
            result,
            Err(SubmitError::Delivery(WebhookError::Rejected { status: 500 }))
        ));
        assert_eq!(controller.phase(), SubmissionPhase::Failed);
        assert!(!controller.is_submitting());

        let inbox = inbox.borrow();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Error);
        assert!(!inbox[0].description.contains("500"));
    }

    #[tokio::test]
    async fn transport_failure_maps_to_failed() {
        let transport = ScriptedTransport::answering(&[Outcome::Unreachable]);
        let (controller, inbox) = controller(transport);

        let result = controller.submit().await;

        assert!(matches!(
            result,
            Err(SubmitError::Delivery(WebhookError::Transport { .. }))
        ));
        assert_eq!(controller.phase(), SubmissionPhase::Failed);
        assert_eq!(*inbox.borrow(), vec![Notification::FAILED]);
    }

    #[tokio::test]
    async fn second_submit_while_in_flight_is_ignored() {
        let (transport, gate) = ScriptedTransport::gated(Outcome::Status(200));
        let (controller, _inbox) = controller(transport.clone());

        let first = controller.submit();
        let second = async {
            wait_for_flight(&controller).await;
            let result = controller.submit().await;
            gate.notify_one();
            result
        };
        let (first, second) = tokio::join!(first, second);

        assert!(first.is_ok());
        assert!(matches!(second, Err(SubmitError::AlreadyInProgress)));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(controller.phase(), SubmissionPhase::Submitted);
    }

    #[tokio::test]
    async fn retry_after_failure_is_allowed() {
        let transport =
            ScriptedTransport::answering(&[Outcome::Status(503), Outcome::Status(201)]);
        let (controller, inbox) = controller(transport.clone());

        assert!(controller.submit().await.is_err());
        assert_eq!(controller.phase(), SubmissionPhase::Failed);

        assert!(controller.submit().await.is_ok());
        assert_eq!(controller.phase(), SubmissionPhase::Submitted);
        assert_eq!(transport.request_count(), 2);
        assert_eq!(
            *inbox.borrow(),
            vec![Notification::FAILED, Notification::SENT]
        );
    }

    #[tokio::test]
    async fn submit_after_success_is_ignored_until_reset() {
        let transport = ScriptedTransport::answering(&[Outcome::Status(200), Outcome::Status(200)]);
        let (controller, _inbox) = controller(transport.clone());

        controller.submit().await.unwrap();
        assert!(matches!(
            controller.submit().await,
            Err(SubmitError::AlreadySubmitted)
        ));
        assert_eq!(transport.request_count(), 1);

        assert_eq!(controller.reset(), Transition::Moved(SubmissionPhase::Idle));
        controller.submit().await.unwrap();
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn phase_always_settles_to_a_terminal_outcome() {
        let script = [
            Outcome::Status(200),
            Outcome::Status(404),
            Outcome::Unreachable,
            Outcome::Status(204),
            Outcome::Status(500),
        ];
        for outcome in script {
            let transport = ScriptedTransport::answering(&[outcome]);
            let (controller, _inbox) = controller(transport);
            let _ = controller.submit().await;
            let _ = controller.submit().await;
            assert!(
                matches!(
                    controller.phase(),
                    SubmissionPhase::Submitted | SubmissionPhase::Failed
                ),
                "unsettled phase {:?}",
                controller.phase()
            );
        }
    }

    #[tokio::test]
    async fn field_updates_never_send_or_change_phase() {
        let transport = ScriptedTransport::answering(&[]);
        let (controller, inbox) = controller(transport.clone());

        for field in FormField::ALL {
            controller.update_field(field, "changed");
            assert_eq!(controller.form().get(field), "changed");
            assert_eq!(controller.phase(), SubmissionPhase::Idle);
        }

        assert_eq!(transport.request_count(), 0);
        assert!(inbox.borrow().is_empty());
    }

    #[tokio::test]
    async fn field_updates_during_flight_do_not_alter_sent_payload() {
        let (transport, gate) = ScriptedTransport::gated(Outcome::Status(200));
        let (controller, _inbox) = controller(transport.clone());

        let submit = controller.submit();
        let edit = async {
            wait_for_flight(&controller).await;
            controller.update_field(FormField::Message, "edited later");
            assert_eq!(controller.phase(), SubmissionPhase::Submitting);
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(submit, edit);

        assert!(result.is_ok());
        assert_eq!(transport.last_body()["message"], "Let's talk.");
        assert_eq!(controller.form().get(FormField::Message), "edited later");
    }

    #[tokio::test]
    async fn abandoned_submission_settles_as_failed() {
        let (transport, _gate) = ScriptedTransport::gated(Outcome::Status(200));
        let (controller, inbox) = controller(transport);

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), controller.submit()).await;

        assert!(timed_out.is_err());
        assert_eq!(controller.phase(), SubmissionPhase::Failed);
        assert_eq!(*inbox.borrow(), vec![Notification::FAILED]);
    }

    #[tokio::test]
    async fn stale_outcome_is_not_applied_after_dispose() {
        let (transport, gate) = ScriptedTransport::gated(Outcome::Status(200));
        let (controller, inbox) = controller(transport);

        let submit = controller.submit();
        let teardown = async {
            wait_for_flight(&controller).await;
            controller.dispose();
            gate.notify_one();
        };
        let (result, ()) = tokio::join!(submit, teardown);

        assert!(result.is_ok());
        assert_eq!(controller.phase(), SubmissionPhase::Submitting);
        assert!(inbox.borrow().is_empty());
        assert!(matches!(controller.submit().await, Err(SubmitError::Disposed)));
    }

    #[tokio::test]
    async fn notifier_can_read_the_controller_it_is_notified_by() {
        type Slot = Rc<RefCell<Option<Rc<SubmissionController<ScriptedTransport>>>>>;
        let slot: Slot = Rc::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (reader, sink) = (Rc::clone(&slot), Rc::clone(&seen));
        let endpoint = Url::parse("http://localhost:5678/webhook/contact-form").unwrap();
        let controller = Rc::new(SubmissionController::new(
            endpoint,
            ScriptedTransport::answering(&[Outcome::Status(500)]),
            move |_: &Notification| {
                if let Some(controller) = reader.borrow().as_ref() {
                    let email = controller.form().get(FormField::Email).to_owned();
                    sink.borrow_mut().push((controller.phase(), email));
                }
            },
        ));
        *slot.borrow_mut() = Some(Rc::clone(&controller));
        fill(&controller);

        assert!(controller.submit().await.is_err());

        assert_eq!(
            *seen.borrow(),
            vec![(SubmissionPhase::Failed, "ada@example.com".to_owned())]
        );
        slot.borrow_mut().take();
    }
}
