mod common;

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use ash::vk;
use common::TestContext;
use serial_test::serial;
use vk_recorder::commands::*;
use vk_recorder::*;

#[test]
#[serial]
fn sessions_on_one_buffer_never_interleave() {
    let ctx = TestContext::new();
    let cmd = Arc::new(allocate(&ctx.pool, CommandBufferLevel::Primary, 1).unwrap().remove(0));
    ctx.native.slow_record(Duration::from_millis(5));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let cmd = cmd.clone();
            thread::spawn(move || {
                let dispatch = Dispatch::default();
                let units: [&dyn Command; 3] = [&dispatch, &dispatch, &dispatch];
                compile(&cmd, &BeginInfo::default(), &units).unwrap();
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let sessions = ctx.native.sessions(cmd.raw());
    assert_eq!(sessions.len(), 8);
    for pair in sessions.chunks(2) {
        assert_eq!(pair, ["begin", "end"]);
    }
    assert_eq!(ctx.native.recorded(cmd.raw()).len(), 12);
}

#[test]
#[serial]
fn second_begin_blocks_until_first_scope_drops() {
    let ctx = TestContext::new();
    let cmd = Arc::new(allocate(&ctx.pool, CommandBufferLevel::Primary, 1).unwrap().remove(0));

    let scope = begin(&cmd, &BeginInfo::default()).unwrap();
    let (tx, rx) = mpsc::channel();
    let waiter = {
        let cmd = cmd.clone();
        thread::spawn(move || {
            let scope = begin(&cmd, &BeginInfo::default()).unwrap();
            tx.send(()).unwrap();
            drop(scope);
        })
    };

    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    drop(scope);
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    waiter.join().unwrap();

    assert_eq!(
        ctx.native.sessions(cmd.raw()),
        vec!["begin", "end", "begin", "end"]
    );
}

#[test]
#[serial]
fn failed_compile_releases_lock_for_other_threads() {
    let ctx = TestContext::new();
    let cmd = Arc::new(allocate(&ctx.pool, CommandBufferLevel::Primary, 1).unwrap().remove(0));
    let failing = |_: &mut CmdArgs<'_>| -> vk_recorder::Result<()> {
        Err(vk::Result::ERROR_DEVICE_LOST.into())
    };

    let err = compile(&cmd, &BeginInfo::default(), &[&failing as &dyn Command]).unwrap_err();
    assert_eq!(err.result(), vk::Result::ERROR_DEVICE_LOST);

    let other = {
        let cmd = cmd.clone();
        thread::spawn(move || {
            begin_timeout(&cmd, &BeginInfo::default(), Duration::from_secs(5))
                .unwrap()
                .is_some()
        })
    };
    assert!(other.join().unwrap());
}

#[test]
#[serial]
fn try_begin_and_timeout_give_up_while_recording() {
    let ctx = TestContext::new();
    let cmd = allocate(&ctx.pool, CommandBufferLevel::Primary, 1).unwrap().remove(0);

    let scope = begin(&cmd, &BeginInfo::default()).unwrap();
    thread::scope(|s| {
        s.spawn(|| {
            assert!(try_begin(&cmd, &BeginInfo::default()).unwrap().is_none());
            let timed = begin_timeout(&cmd, &BeginInfo::default(), Duration::from_millis(20));
            assert!(timed.unwrap().is_none());
        });
    });
    scope.end().unwrap();

    assert!(try_begin(&cmd, &BeginInfo::default()).unwrap().is_some());
    assert_eq!(
        ctx.native.sessions(cmd.raw()),
        vec!["begin", "end", "begin", "end"]
    );
}

#[test]
#[serial]
fn buffers_from_one_pool_record_in_parallel() {
    let ctx = TestContext::new();
    let buffers = allocate(&ctx.pool, CommandBufferLevel::Primary, 2).unwrap();
    let a_res: Arc<Buffer> = ctx.resource();
    let b_res: Arc<Buffer> = ctx.resource();
    ctx.native.slow_record(Duration::from_millis(2));

    thread::scope(|s| {
        for (cmd, res) in buffers.iter().zip([&a_res, &b_res]) {
            s.spawn(move || {
                let fill = FillBuffer {
                    buffer: res.clone(),
                    offset: 0,
                    size: 16,
                    data: 0,
                };
                let tag = move |args: &mut CmdArgs<'_>| -> vk_recorder::Result<()> {
                    args.on_pre_execute(|_| {});
                    Ok(())
                };
                for _ in 0..10 {
                    let units: [&dyn Command; 2] = [&fill, &tag];
                    compile(cmd, &BeginInfo::default(), &units).unwrap();
                }
            });
        }
    });

    buffers[0].with_references(|refs| {
        assert_eq!(refs.len(), 1);
        assert!(refs.contains(&a_res));
        assert!(!refs.contains(&b_res));
    });
    buffers[1].with_references(|refs| {
        assert_eq!(refs.len(), 1);
        assert!(refs.contains(&b_res));
        assert!(!refs.contains(&a_res));
    });
    assert_eq!(buffers[0].hook_count(), 1);
    assert_eq!(buffers[1].hook_count(), 1);
    assert_eq!(ctx.native.recorded(buffers[0].raw()).len(), 10);
    assert_eq!(ctx.native.recorded(buffers[1].raw()).len(), 10);
}
