//! Message templates — one subject/plain/HTML triple per notification kind.

use chrono::{DateTime, Local, NaiveDate};

use herald_core::config::HeraldConfig;
use herald_core::error::{HeraldError, Result};
use herald_core::types::{BatchSummary, Message, NotificationKind, NotificationRecord};

/// Renders messages for every kind; shared by all transports.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    /// Shop name in order mails.
    pub store_name: String,
    /// Column holding the order recipient's address.
    pub recipient_column: String,
    /// Who gets reminders and the batch summary.
    pub reminder_receiver: String,
    pub reminder_receiver_name: String,
    /// Sender name on reminders and the batch summary.
    pub reminder_sender_name: String,
}

impl MessageBuilder {
    pub fn from_config(config: &HeraldConfig) -> Self {
        let reminder_receiver = if config.reminders.receiver.is_empty() {
            config.email.account.clone()
        } else {
            config.reminders.receiver.clone()
        };
        Self {
            store_name: config.email.display_name.clone(),
            recipient_column: config.orders.recipient_column.clone(),
            reminder_receiver,
            reminder_receiver_name: config.reminders.receiver_name.clone(),
            reminder_sender_name: config.reminders.sender_name.clone(),
        }
    }

    pub fn build(&self, kind: NotificationKind, record: &NotificationRecord) -> Result<Message> {
        match kind {
            NotificationKind::Confirmation => self.order_confirmation(record),
            NotificationKind::Shipping => self.shipping_notice(record),
            NotificationKind::Delivery => self.delivery_confirmation(record),
            NotificationKind::Reminder => self.event_reminder(record),
        }
    }

    fn order_recipient(&self, record: &NotificationRecord) -> Result<(String, String)> {
        let to = record.attr(&self.recipient_column).ok_or_else(|| {
            HeraldError::Template(format!(
                "order {} has no '{}'",
                record.subject_id, self.recipient_column
            ))
        })?;
        let name = record.attr("customer_name").unwrap_or("Customer");
        Ok((to.to_string(), name.to_string()))
    }

    fn order_confirmation(&self, record: &NotificationRecord) -> Result<Message> {
        let (to, name) = self.order_recipient(record)?;
        let id = &record.subject_id;
        let details = order_details(record);
        let total = order_total(record)
            .map(|t| format!("${t:.2}"))
            .unwrap_or_else(|| "see your receipt".into());
        let store = &self.store_name;

        let text = format!(
            "Dear {name},\n\n\
             Thank you for your order! We're pleased to confirm that we've received your order #{id}.\n\n\
             Order Details:\n{details}\n\n\
             Total Amount: {total}\n\n\
             We'll send you another email once your order has been shipped.\n\n\
             If you have any questions about your order, please contact our customer service.\n\n\
             Thank you for shopping with {store}!\n"
        );
        let html = wrap_html(&format!(
            "<h2>Order Confirmation</h2>\
             <p>Dear {name},</p>\
             <p>Thank you for your order! We're pleased to confirm that we've received your order <strong>#{id}</strong>.</p>\
             <h3>Order Details:</h3><p>{details}</p>\
             <p><strong>Total Amount:</strong> {total}</p>\
             <p>We'll send you another email once your order has been shipped.</p>\
             <p>If you have any questions about your order, please contact our customer service.</p>\
             <p>Thank you for shopping with {store}!</p>",
            name = escape_html(&name),
            id = escape_html(id),
            details = escape_html(&details),
            total = escape_html(&total),
            store = escape_html(store),
        ));

        Ok(Message {
            to,
            to_name: Some(name),
            from_name: None,
            subject: format!("Order Confirmation #{id}"),
            text_body: text,
            html_body: Some(html),
        })
    }

    fn shipping_notice(&self, record: &NotificationRecord) -> Result<Message> {
        let (to, name) = self.order_recipient(record)?;
        let id = &record.subject_id;
        let carrier = record.attr("shipping_carrier").unwrap_or("our carrier");
        let eta = record
            .attr("delivery_date")
            .map(format_date)
            .unwrap_or_else(|| "Unknown".into());
        let tracking = record.attr("tracking_number").unwrap_or("not yet available");
        let store = &self.store_name;

        let text = format!(
            "Dear {name},\n\n\
             Great news! Your order #{id} has been shipped.\n\n\
             Shipping Details:\nCarrier: {carrier}\nEstimated delivery: {eta}\n\n\
             Tracking Number: {tracking}\n\n\
             You can track your package using the tracking number above at our carrier's website.\n\n\
             If you have any questions, please contact our customer service.\n\n\
             Thank you for shopping with {store}!\n"
        );
        let html = wrap_html(&format!(
            "<h2>Shipping Confirmation</h2>\
             <p>Dear {name},</p>\
             <p>Great news! Your order <strong>#{id}</strong> has been shipped.</p>\
             <h3>Shipping Details:</h3>\
             <p>Carrier: {carrier}<br>Estimated delivery: {eta}</p>\
             <p><strong>Tracking Number:</strong> {tracking}</p>\
             <p>You can track your package using the tracking number above at our carrier's website.</p>\
             <p>If you have any questions, please contact our customer service.</p>\
             <p>Thank you for shopping with {store}!</p>",
            name = escape_html(&name),
            id = escape_html(id),
            carrier = escape_html(carrier),
            eta = escape_html(&eta),
            tracking = escape_html(tracking),
            store = escape_html(store),
        ));

        Ok(Message {
            to,
            to_name: Some(name),
            from_name: None,
            subject: format!("Your Order #{id} Has Been Shipped"),
            text_body: text,
            html_body: Some(html),
        })
    }

    fn delivery_confirmation(&self, record: &NotificationRecord) -> Result<Message> {
        let (to, name) = self.order_recipient(record)?;
        let id = &record.subject_id;
        let store = &self.store_name;

        let text = format!(
            "Dear {name},\n\n\
             Your order #{id} has been delivered!\n\n\
             We hope you're enjoying your purchase. If you have a moment, we'd appreciate it if you could leave a review of the products you purchased.\n\n\
             If you have any questions or concerns about your order, please contact our customer service.\n\n\
             Thank you for shopping with {store}!\n"
        );
        let html = wrap_html(&format!(
            "<h2>Delivery Confirmation</h2>\
             <p>Dear {name},</p>\
             <p>Your order <strong>#{id}</strong> has been delivered!</p>\
             <p>We hope you're enjoying your purchase. If you have a moment, we'd appreciate it if you could leave a review of the products you purchased.</p>\
             <p>If you have any questions or concerns about your order, please contact our customer service.</p>\
             <p>Thank you for shopping with {store}!</p>",
            name = escape_html(&name),
            id = escape_html(id),
            store = escape_html(store),
        ));

        Ok(Message {
            to,
            to_name: Some(name),
            from_name: None,
            subject: format!("Your Order #{id} Has Been Delivered"),
            text_body: text,
            html_body: Some(html),
        })
    }

    fn reminder_recipient(&self) -> Result<String> {
        if self.reminder_receiver.is_empty() {
            return Err(HeraldError::Template(
                "no reminder receiver configured".into(),
            ));
        }
        Ok(self.reminder_receiver.clone())
    }

    fn event_reminder(&self, record: &NotificationRecord) -> Result<Message> {
        let to = self.reminder_recipient()?;
        let event_time = record
            .attr("event_time")
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Local))
            .ok_or_else(|| {
                HeraldError::Template(format!("event {} has no valid event_time", record.subject_id))
            })?;
        let details = record.attr("details").unwrap_or("(no details)");
        let name = &self.reminder_receiver_name;
        let when = event_time.format("%I:%M %p on %B %d, %Y").to_string();

        let text = format!(
            "Hi {name},\n\n\
             This is a reminder about your upcoming event:\n\n\
             Event Time: {when}\n\
             Details: {details}\n\n\
             Best regards,\nYour Reminder Service\n"
        );
        let html = wrap_html(&format!(
            "<p>Hi {name},</p>\
             <p>This is a reminder about your upcoming event:</p>\
             <p><strong>Event Time:</strong> {when}</p>\
             <p><strong>Details:</strong> {details}</p>\
             <p>Best regards,</p><p>Your Reminder Service</p>",
            name = escape_html(name),
            when = escape_html(&when),
            details = escape_html(details),
        ));

        Ok(Message {
            to,
            to_name: Some(name.clone()),
            from_name: Some(self.reminder_sender_name.clone()),
            subject: format!("Reminder: Event at {}", event_time.format("%I:%M %p")),
            text_body: text,
            html_body: Some(html),
        })
    }

    /// The operator's "all reminders scheduled" message.
    pub fn batch_summary(&self, summary: &BatchSummary) -> Result<Message> {
        let to = self.reminder_recipient()?;
        let count = summary.scheduled;
        let last = summary
            .last_fire_time
            .with_timezone(&Local)
            .format("%I:%M %p")
            .to_string();

        let text = format!(
            "Hi Admin,\n\n\
             All {count} event reminders have been scheduled.\n\
             The last one will be sent at {last}.\n\n\
             Please refresh your sheet and rerun for new events.\n\n\
             Best regards,\nYour Reminder Service\n"
        );
        let html = wrap_html(&format!(
            "<p>Hi Admin,</p>\
             <p>All {count} event reminders have been scheduled.</p>\
             <p>The last one will be sent at {last}.</p>\
             <p>Please refresh your sheet and rerun for new events.</p>\
             <p>Best regards,</p><p>Your Reminder Service</p>"
        ));

        Ok(Message {
            to,
            to_name: None,
            from_name: Some(self.reminder_sender_name.clone()),
            subject: "All Event Reminders Have Been Scheduled".into(),
            text_body: text,
            html_body: Some(html),
        })
    }
}

/// `<product> x <qty> - $<unit> each`, from whatever columns exist.
fn order_details(record: &NotificationRecord) -> String {
    let product = record.attr("product_name").unwrap_or("Your items");
    match (record.attr("quantity"), unit_price(record)) {
        (Some(qty), Some(unit)) => format!("{product} x {qty} - ${unit:.2} each"),
        (Some(qty), None) => format!("{product} x {qty}"),
        _ => product.to_string(),
    }
}

fn unit_price(record: &NotificationRecord) -> Option<f64> {
    record
        .attr("unit_price")
        .and_then(|p| p.trim_start_matches('$').parse().ok())
}

fn order_total(record: &NotificationRecord) -> Option<f64> {
    let qty: f64 = record.attr("quantity")?.parse().ok()?;
    Some(qty * unit_price(record)?)
}

/// Sheet dates come in a few shapes; anything else is shown as-is.
fn format_date(raw: &str) -> String {
    const FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y-%m-%d %H:%M:%S"];
    FORMATS
        .iter()
        .find_map(|f| {
            NaiveDate::parse_from_str(raw, f).ok().or_else(|| {
                chrono::NaiveDateTime::parse_from_str(raw, f)
                    .ok()
                    .map(|dt| dt.date())
            })
        })
        .map(|d| d.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn wrap_html(inner: &str) -> String {
    format!(
        "<html>\n  <body style=\"font-family: Arial, sans-serif; line-height: 1.6;\">\n    {inner}\n  </body>\n</html>\n"
    )
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
