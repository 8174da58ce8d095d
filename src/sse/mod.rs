mod server_sent_event;

pub use server_sent_event::ServerSentEvent;
