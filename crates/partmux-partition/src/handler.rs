/// Anything that consumes raw frames for one stream.
///
/// Installed once per stream id; every later frame for that id reaches
/// `on_message` with its transport type id and the complete frame bytes.
/// The region is only valid for the duration of the call.
pub trait MessageHandler: Send + Sync {
    fn on_message(&self, type_id: u32, frame: &[u8]);
}

impl<F> MessageHandler for F
where
    F: Fn(u32, &[u8]) + Send + Sync,
{
    fn on_message(&self, type_id: u32, frame: &[u8]) {
        self(type_id, frame)
    }
}
