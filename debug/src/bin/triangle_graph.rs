//! Minimal frame loop: draw a triangle into an offscreen target through the
//! graph, blit it to the swapchain, and dump the recorded command stream.

use ember_render::RdgBuilder;
use ember_rhi::soft::SoftDevice;
use ember_rhi::{
    AttachmentLoadOp, AttachmentStoreOp, Backend, BackendInfo, BufferInfo, Color4, CommandPool,
    CommandPoolInfo, Device, Extent2D, Extent3D, Format, MemoryUsage, QueueInfo, Resource,
    ResourceState, ResourceTypeFlags, Swapchain, SwapchainInfo, TextureSubresourceLayers,
    TextureSubresourceRange,
};

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Vertex {
    position: [f32; 3],
    color: [f32; 4],
}

const TRIANGLE: [Vertex; 3] = [
    Vertex { position: [0.0, 0.5, 0.0], color: [1.0, 0.0, 0.0, 1.0] },
    Vertex { position: [0.5, -0.5, 0.0], color: [0.0, 1.0, 0.0, 1.0] },
    Vertex { position: [-0.5, -0.5, 0.0], color: [0.0, 0.0, 1.0, 1.0] },
];

fn main() {
    env_logger::init();

    let device = Backend::init(BackendInfo { enable_debug: true, ..Default::default() });
    let queue = device.get_queue(&QueueInfo::default());
    let swapchain = device
        .create_swapchain(SwapchainInfo {
            image_count: 3,
            extent: Extent2D::new(1280, 720),
            format: Format::Bgra8Unorm,
            present_queue: queue.clone(),
            surface: None,
        })
        .expect("swapchain creation failed");
    let command_pool = CommandPool::new(device.clone(), CommandPoolInfo { queue });

    let vertex_buffer = device
        .create_buffer(BufferInfo {
            size: std::mem::size_of_val(&TRIANGLE) as u64,
            stride: std::mem::size_of::<Vertex>() as u32,
            memory_usage: MemoryUsage::CpuToGpu,
            resource_type: ResourceTypeFlags::VERTEX_BUFFER,
            ..Default::default()
        })
        .expect("vertex buffer creation failed");
    device
        .write_buffer(&vertex_buffer, 0, bytemuck::cast_slice(&TRIANGLE))
        .expect("vertex upload failed");

    for frame in 0..3u32 {
        let backbuffer = swapchain.get_new_frame(None, None).expect("swapchain acquire failed");
        log::info!("frame {frame}: backbuffer '{}'", backbuffer.name());

        let command = command_pool.create_command_list(true).expect("command list checkout");
        let mut builder = RdgBuilder::new(device.clone(), command);

        let scene = builder
            .create_texture("SceneColor")
            .format(Format::Bgra8Unorm)
            .extent(Extent3D::new(1280, 720, 1))
            .allow_render_target()
            .finish();
        let present_target = builder
            .create_texture("Backbuffer")
            .import(backbuffer, ResourceState::Present)
            .finish();
        let vertices = builder
            .create_buffer("TriangleVertices")
            .import(vertex_buffer.clone(), ResourceState::VertexBuffer)
            .finish();

        builder
            .create_render_pass("ForwardPass")
            .color(
                0,
                scene,
                AttachmentLoadOp::Clear,
                AttachmentStoreOp::Store,
                Color4::new(0.1, 0.2, 0.4, 1.0),
                TextureSubresourceRange::default(),
            )
            .execute(move |ctx| {
                if let Some(buffer) = ctx.resources.buffer(vertices) {
                    ctx.command.bind_vertex_buffer(&buffer, 0, 0);
                }
                ctx.command.draw(3, 1, 0, 0);
            })
            .finish();
        builder
            .create_present_pass("PresentPass")
            .texture(scene, TextureSubresourceLayers::default())
            .present_texture(present_target)
            .finish();

        if frame == 0 {
            builder.export_graphviz("triangle_graph.dot");
        }

        builder.execute();
        builder.command().execute(None, None, None);
        swapchain.present(None);

        ember_render::advance_frame();
        device.tick();
    }

    if let Some(soft) = device.as_any().downcast_ref::<SoftDevice>() {
        println!("recorded command stream:");
        for record in soft.take_journal() {
            println!("  {record:?}");
        }
    }
}
