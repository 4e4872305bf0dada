#[derive(Clone, Debug, PartialEq)]
pub enum ProgressMessage {
    Started {
        total: usize,
    },
    UnitFinished {
        unit: String,
        ok: bool,
    },
    Finished,
}
