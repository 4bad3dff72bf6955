// 同期プリミティブ層 - チャンネル、キャンセル、完了ラッチ、多重化
// エンジン層の全ての協調はこの層の型を通して行う

pub mod cancellation;
pub mod channel;
pub mod latch;
pub mod multiplexer;

// 公開API
pub use cancellation::CancellationSignal;
pub use channel::{BoundedChannel, ChannelReceiver, ChannelSender, CloseGuard, TryReceive};
pub use latch::{CompletionLatch, LatchGuard};
pub use multiplexer::{select, try_select, Multiplexer, SelectOutcome};
