use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderDeliveredEvent,
    OrderShippedEvent,
    OtpIssuedEvent,
    PaymentConfirmedEvent,
    WithdrawalCompletedEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_confirmed_producer: Vec<EventProducer<PaymentConfirmedEvent>>,
    pub order_shipped_producer: Vec<EventProducer<OrderShippedEvent>>,
    pub order_delivered_producer: Vec<EventProducer<OrderDeliveredEvent>>,
    pub otp_issued_producer: Vec<EventProducer<OtpIssuedEvent>>,
    pub withdrawal_completed_producer: Vec<EventProducer<WithdrawalCompletedEvent>>,
}

pub struct EventHandlers {
    pub on_payment_confirmed: Option<EventHandler<PaymentConfirmedEvent>>,
    pub on_order_shipped: Option<EventHandler<OrderShippedEvent>>,
    pub on_order_delivered: Option<EventHandler<OrderDeliveredEvent>>,
    pub on_otp_issued: Option<EventHandler<OtpIssuedEvent>>,
    pub on_withdrawal_completed: Option<EventHandler<WithdrawalCompletedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_payment_confirmed: hooks.on_payment_confirmed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_shipped: hooks.on_order_shipped.map(|f| EventHandler::new(buffer_size, f)),
            on_order_delivered: hooks.on_order_delivered.map(|f| EventHandler::new(buffer_size, f)),
            on_otp_issued: hooks.on_otp_issued.map(|f| EventHandler::new(buffer_size, f)),
            on_withdrawal_completed: hooks.on_withdrawal_completed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_confirmed {
            result.payment_confirmed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_shipped {
            result.order_shipped_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_delivered {
            result.order_delivered_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_otp_issued {
            result.otp_issued_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_withdrawal_completed {
            result.withdrawal_completed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_payment_confirmed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_shipped {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_order_delivered {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_otp_issued {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_withdrawal_completed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_confirmed: Option<Handler<PaymentConfirmedEvent>>,
    pub on_order_shipped: Option<Handler<OrderShippedEvent>>,
    pub on_order_delivered: Option<Handler<OrderDeliveredEvent>>,
    pub on_otp_issued: Option<Handler<OtpIssuedEvent>>,
    pub on_withdrawal_completed: Option<Handler<WithdrawalCompletedEvent>>,
}

impl EventHooks {
    pub fn on_payment_confirmed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentConfirmedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_confirmed = Some(Arc::new(f));
        self
    }

    pub fn on_order_shipped<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderShippedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_shipped = Some(Arc::new(f));
        self
    }

    pub fn on_order_delivered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderDeliveredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_order_delivered = Some(Arc::new(f));
        self
    }

    pub fn on_otp_issued<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OtpIssuedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_otp_issued = Some(Arc::new(f));
        self
    }

    pub fn on_withdrawal_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(WithdrawalCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_withdrawal_completed = Some(Arc::new(f));
        self
    }
}
