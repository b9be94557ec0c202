//! Blocking emulation and the multiplexed waiters, driven through pipes
//! whose readiness flows through mock kernel events.

mod common;

use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use capio::events::Events;
use capio::poll::{FdSet, PollFd};
use capio::{Errno, Mode, OFlags};

use common::{fs_env, mem_pipe};

#[test]
fn nonblocking_pipe_read_is_eagain() {
    let env = fs_env();
    let state = env.state;

    let [rfd, wfd] = state.pipe2(OFlags::NONBLOCK).unwrap();
    let mut buf = [0u8; 10];
    // Nothing written yet: surfaced directly instead of blocking.
    assert_eq!(state.read(rfd, &mut buf), Err(Errno::EAGAIN));

    state.write(wfd, b"abc").unwrap();
    assert_eq!(state.read(rfd, &mut buf), Ok(3));
    assert_eq!(&buf[..3], b"abc");

    state.close(rfd).unwrap();
    state.close(wfd).unwrap();
}

#[test]
fn pipe2_rejects_unknown_flags() {
    let env = fs_env();
    assert_eq!(env.state.pipe2(OFlags::CREAT), Err(Errno::EINVAL));
    assert_eq!(
        env.state.pipe2(OFlags::NONBLOCK | OFlags::DIRECTORY),
        Err(Errno::EINVAL)
    );
    assert!(env.state.pipe2(OFlags::NONBLOCK | OFlags::CLOEXEC).is_ok());
}

#[test]
fn blocking_read_suspends_until_readable() {
    let env = fs_env();
    let state = env.state;
    let [rfd, wfd] = state.pipe().unwrap();

    thread::scope(|scope| {
        scope.spawn(|| {
            thread::sleep(Duration::from_millis(30));
            state.write(wfd, b"wake").unwrap();
        });
        let mut buf = [0u8; 8];
        // Blocks in the kernel wait until the writer lands.
        assert_eq!(state.read(rfd, &mut buf), Ok(4));
        assert_eq!(&buf[..4], b"wake");
    });

    state.close(wfd).unwrap();
    // Writer gone and the buffer drained: EOF, not a hang.
    let mut buf = [0u8; 8];
    assert_eq!(state.read(rfd, &mut buf), Ok(0));
    state.close(rfd).unwrap();
}

#[test]
fn poll_timeout_calls_handshake_once() {
    let env = fs_env();
    let state = env.state;
    let (read, write, probe) = mem_pipe(env.kernel);
    let rfd = state.bind(read, -1, 0).unwrap();
    let wfd = state.bind(write, -1, 0).unwrap();

    let mut fds = [PollFd::new(rfd, Events::IN)];
    let n = state.poll(&mut fds, Some(Duration::from_millis(50))).unwrap();
    assert_eq!(n, 0);
    assert_eq!(fds[0].revents, Events::empty());
    assert_eq!(probe.read_wait_begins.load(Ordering::SeqCst), 1);
    assert_eq!(probe.read_wait_ends.load(Ordering::SeqCst), 1);

    state.close(rfd).unwrap();
    state.close(wfd).unwrap();
}

#[test]
fn poll_ignores_negative_and_flags_invalid() {
    let env = fs_env();
    let state = env.state;

    // Only negative entries: nothing to wait for, zero revents, returns
    // immediately even with an infinite timeout.
    let mut fds = [PollFd::new(-1, Events::IN), PollFd::new(-2, Events::OUT)];
    assert_eq!(state.poll(&mut fds, None), Ok(0));
    assert!(fds.iter().all(|pfd| pfd.revents.is_empty()));

    // A closed fd reports POLLNVAL without failing the call.
    let [rfd, wfd] = state.pipe().unwrap();
    state.write(wfd, b"x").unwrap();
    let mut fds = [
        PollFd::new(-1, Events::IN),
        PollFd::new(999, Events::IN),
        PollFd::new(rfd, Events::IN),
    ];
    let n = state.poll(&mut fds, Some(Duration::from_millis(50))).unwrap();
    // POLLNVAL entries are flagged but never waited on or counted.
    assert_eq!(n, 1);
    assert_eq!(fds[0].revents, Events::empty());
    assert_eq!(fds[1].revents, Events::NVAL);
    assert_eq!(fds[2].revents, Events::IN);

    state.close(rfd).unwrap();
    state.close(wfd).unwrap();
}

#[test]
fn poll_sees_readiness_and_hup() {
    let env = fs_env();
    let state = env.state;
    let [rfd, wfd] = state.pipe().unwrap();

    state.write(wfd, b"ping").unwrap();
    let mut fds = [PollFd::new(rfd, Events::IN), PollFd::new(wfd, Events::OUT)];
    let n = state.poll(&mut fds, None).unwrap();
    assert_eq!(n, 2);
    assert_eq!(fds[0].revents, Events::IN);
    assert_eq!(fds[1].revents, Events::OUT);

    // Writer close surfaces HUP on the read side even when only IN was
    // requested.
    let mut drain = [0u8; 8];
    state.read(rfd, &mut drain).unwrap();
    state.close(wfd).unwrap();
    let mut fds = [PollFd::new(rfd, Events::IN)];
    let n = state.poll(&mut fds, Some(Duration::from_millis(50))).unwrap();
    assert_eq!(n, 1);
    assert!(fds[0].revents.contains(Events::HUP));

    state.close(rfd).unwrap();
}

#[test]
fn select_projects_fd_sets() {
    let env = fs_env();
    let state = env.state;
    let [rfd, wfd] = state.pipe().unwrap();
    let nfds = (rfd.max(wfd) + 1) as usize;

    // Write side is ready immediately; the idle read bit gets cleared.
    let mut rset = FdSet::new();
    rset.insert(rfd);
    let mut wset = FdSet::new();
    wset.insert(wfd);
    let n = state
        .select(nfds, Some(&mut rset), Some(&mut wset), None, None)
        .unwrap();
    assert_eq!(n, 1);
    assert!(!rset.contains(rfd));
    assert!(wset.contains(wfd));

    state.write(wfd, b"go").unwrap();
    let mut rset = FdSet::new();
    rset.insert(rfd);
    let n = state
        .select(nfds, Some(&mut rset), None, None, None)
        .unwrap();
    assert_eq!(n, 1);
    assert!(rset.contains(rfd));

    assert_eq!(state.select(0, None, None, None, None), Err(Errno::EINVAL));

    state.close(rfd).unwrap();
    state.close(wfd).unwrap();
}

#[test]
fn wait_fd_round_trip() {
    let env = fs_env();
    let state = env.state;
    let [rfd, wfd] = state.pipe().unwrap();

    assert_eq!(
        state.wait_fd(rfd, Events::IN, Some(Duration::from_millis(20))),
        Err(Errno::ETIMEDOUT)
    );

    state.write(wfd, b"x").unwrap();
    let events = state.wait_fd(rfd, Events::IN, None).unwrap();
    assert!(events.contains(Events::IN));

    assert_eq!(
        state.wait_fd(99, Events::IN, None),
        Err(Errno::EBADF)
    );

    state.close(rfd).unwrap();
    state.close(wfd).unwrap();
}

#[test]
fn wait_on_unwaitable_transport_is_invalid() {
    let env = fs_env();
    let state = env.state;
    let fd = state
        .open("/plain", OFlags::CREAT | OFlags::RDWR, Mode::RWXU)
        .unwrap();

    assert_eq!(state.wait_fd(fd, Events::IN, None), Err(Errno::EINVAL));
    let mut fds = [PollFd::new(fd, Events::IN)];
    assert_eq!(state.poll(&mut fds, None), Err(Errno::EINVAL));

    state.close(fd).unwrap();
}

#[test]
fn write_to_closed_reader_fails() {
    let env = fs_env();
    let state = env.state;
    let [rfd, wfd] = state.pipe().unwrap();
    state.close(rfd).unwrap();
    assert_eq!(state.write(wfd, b"x"), Err(Errno::ENOTCONN));
    state.close(wfd).unwrap();
}
